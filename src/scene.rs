use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::animation::{Animation, Key, Marker, Track, TrackKind, ANIMATION_FLAG_LOOP};
use crate::camera::CameraMode;
use crate::clip::Rect;
use crate::config::RendererConfig;
use crate::fragment::{Colour, TexCoord};
use crate::mesh::Face;
use crate::quaternion::Quaternion;
use crate::texture::TexturePage;

/// Everything a scene file describes, before any runtime object exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub camera: CameraSetup,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub animations: Vec<Animation>,
    pub objects: Vec<SceneObject>,
}

impl Scene {
    /// Parses the scene XML produced by the authoring tools.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let mut scene = Scene::default();

        if let Some(node) = child(&root, "renderer") {
            scene.renderer = parse_renderer(&node).context("invalid <renderer>")?;
        }
        if let Some(node) = child(&root, "camera") {
            scene.camera = parse_camera(&node).context("invalid <camera>")?;
        }
        for node in root.children().filter(|n| n.has_tag_name("texture")) {
            scene.textures.push(parse_texture(&node)?);
        }
        for node in root.children().filter(|n| n.has_tag_name("animation")) {
            scene.animations.push(parse_animation(&node)?);
        }
        for node in root.children().filter(|n| n.has_tag_name("object")) {
            scene.objects.push(parse_object(&node)?);
        }

        Ok(scene)
    }
}

/// Initial camera placement and behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSetup {
    #[serde(default)]
    pub mode: CameraMode,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    /// Object to follow in follow mode, or to look at otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default = "default_follow_distance")]
    pub distance: f32,
    #[serde(default)]
    pub offset: Vec2,
}

impl Default for CameraSetup {
    fn default() -> Self {
        Self {
            mode: CameraMode::Fixed,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            target: None,
            distance: default_follow_distance(),
            offset: Vec2::ZERO,
        }
    }
}

fn default_follow_distance() -> f32 {
    4.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureEntry {
    pub name: String,
    pub page: TexturePage,
}

/// Scene object as described by the authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshDescription>,
}

/// Where a mesh's geometry comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeshSource {
    Cube { half_extent: f32 },
    Inline {
        vertices: Vec<Vec3>,
        faces: Vec<Face>,
        #[serde(default)]
        uvs: Vec<TexCoord>,
        #[serde(default)]
        colours: Vec<Colour>,
        #[serde(default)]
        bone_for_vertex: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneDescription {
    #[serde(default)]
    pub parent: Option<usize>,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Quaternion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDescription {
    pub source: MeshSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default)]
    pub skeleton: Vec<BoneDescription>,
    /// Animation started when the object is spawned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

fn parse_renderer(node: &Node<'_, '_>) -> Result<RendererConfig> {
    let mut config = RendererConfig::default();
    if let Some(value) = optional_text(node, "table_size") {
        config.ordering_table_size = parse_number(&value, "table_size")?;
    }
    if let Some(value) = optional_text(node, "fragment_capacity") {
        config.fragment_capacity = parse_number(&value, "fragment_capacity")?;
    }
    if let Some(value) = optional_text(node, "screen") {
        let [x, y, width, height] = parse_components::<i16, 4>(&value, "screen")?;
        config.screen = Rect::new(x, y, width, height);
    }
    config.projection_distance = parse_f32(
        optional_text(node, "projection_distance"),
        config.projection_distance,
    )?;
    if let Some(value) = optional_text(node, "screen_offset") {
        let [x, y] = parse_components::<f32, 2>(&value, "screen_offset")?;
        config.screen_offset = Vec2::new(x, y);
    }
    config.depth_range = parse_f32(optional_text(node, "depth_range"), config.depth_range)?;
    config.background = parse_colour(optional_text(node, "background"), config.background)?;
    config.debug_bones = parse_bool(optional_text(node, "debug_bones"), config.debug_bones)?;
    config.validate()?;
    Ok(config)
}

fn parse_camera(node: &Node<'_, '_>) -> Result<CameraSetup> {
    let mut camera = CameraSetup::default();
    if let Some(mode) = optional_text(node, "mode") {
        camera.mode = match mode.as_str() {
            "fixed" => CameraMode::Fixed,
            "follow" => CameraMode::Follow,
            "free_look" => CameraMode::FreeLook,
            other => bail!("unknown camera mode {other:?}"),
        };
    }
    camera.position = parse_vec3(optional_text(node, "position"), camera.position)?;
    camera.rotation = parse_vec3(optional_text(node, "rotation"), camera.rotation)?;
    camera.target = optional_text(node, "target");
    camera.distance = parse_f32(optional_text(node, "distance"), camera.distance)?;
    if let Some(value) = optional_text(node, "offset") {
        let [x, y] = parse_components::<f32, 2>(&value, "offset")?;
        camera.offset = Vec2::new(x, y);
    }
    if camera.mode == CameraMode::Follow && camera.target.is_none() {
        bail!("follow camera needs a <target>");
    }
    Ok(camera)
}

fn parse_texture(node: &Node<'_, '_>) -> Result<TextureEntry> {
    let name = required_attribute(node, "name", "texture")?;
    let page = (|| -> Result<TexturePage> {
        let tpage = parse_int::<u16>(&required_text(node, "tpage")?, "tpage")?;
        let clut = optional_text(node, "clut")
            .map(|value| parse_int::<u16>(&value, "clut"))
            .transpose()?;
        let uv_offset = match optional_text(node, "uv_offset") {
            Some(value) => {
                let [u, v] = parse_components::<u8, 2>(&value, "uv_offset")?;
                TexCoord::new(u, v)
            }
            None => TexCoord::default(),
        };
        let height = parse_int::<u16>(&required_text(node, "height")?, "height")?;
        Ok(TexturePage {
            tpage,
            clut,
            uv_offset,
            height,
        })
    })()
    .with_context(|| format!("invalid texture {name}"))?;
    Ok(TextureEntry { name, page })
}

fn parse_animation(node: &Node<'_, '_>) -> Result<Animation> {
    let name = required_attribute(node, "name", "animation")?;
    let result = (|| -> Result<Animation> {
        let looped = parse_bool(node.attribute("loop").map(str::to_string), false)?;
        let mut tracks = Vec::new();
        for track in node.children().filter(|n| n.has_tag_name("track")) {
            tracks.push(parse_track(&track)?);
        }
        let mut markers = Vec::new();
        for marker in node.children().filter(|n| n.has_tag_name("marker")) {
            let frame = parse_number(&required_attribute(&marker, "frame", "marker")?, "frame")?;
            let name = marker
                .text()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .ok_or_else(|| anyhow!("<marker> at frame {frame} has no name"))?;
            markers.push(Marker {
                name: name.to_string(),
                frame,
            });
        }
        // without an explicit length the animation ends on its last key
        let length = match node.attribute("length") {
            Some(value) => parse_number(value, "length")?,
            None => tracks
                .iter()
                .filter_map(|track: &Track| track.keys().last())
                .map(|key| key.frame.saturating_add(1))
                .max()
                .unwrap_or(1),
        };
        let flags = if looped { ANIMATION_FLAG_LOOP } else { 0 };
        Ok(Animation::new(name.clone(), flags, length, tracks, markers)?)
    })();
    result.with_context(|| format!("invalid animation {name}"))
}

fn parse_track(node: &Node<'_, '_>) -> Result<Track> {
    let joint: u8 = parse_number(&required_attribute(node, "joint", "track")?, "joint")?;
    let kind = match node.attribute("kind").unwrap_or("rotation") {
        "rotation" => TrackKind::Rotation,
        "translation" => TrackKind::Translation,
        other => bail!("unknown track kind {other:?}"),
    };
    let mut keys = Vec::new();
    for key in node.children().filter(|n| n.has_tag_name("key")) {
        let frame = parse_number(&required_attribute(&key, "frame", "key")?, "frame")?;
        let key = match kind {
            TrackKind::Rotation => Key::rotation(frame, parse_rotation(&key)?),
            TrackKind::Translation => {
                let text = key.text().unwrap_or_default();
                let [x, y, z] = parse_components::<f32, 3>(text, "translation key")?;
                Key::translation(frame, Vec3::new(x, y, z))
            }
        };
        keys.push(key);
    }
    Ok(Track::new(joint, kind, keys)?)
}

/// A rotation is either `axis`/`angle` (degrees) attributes or `w x y z` text.
fn parse_rotation(node: &Node<'_, '_>) -> Result<Quaternion> {
    if let Some(axis) = node.attribute("axis") {
        let [x, y, z] = parse_components::<f32, 3>(axis, "axis")?;
        let angle = parse_f32(node.attribute("angle").map(str::to_string), 0.0)?;
        return Ok(Quaternion::from_axis_angle(
            Vec3::new(x, y, z),
            angle.to_radians(),
        ));
    }
    match node.text().map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => {
            let [w, x, y, z] = parse_components::<f32, 4>(text, "quaternion")?;
            Ok(Quaternion::new(w, x, y, z))
        }
        None => Ok(Quaternion::IDENTITY),
    }
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject> {
    let name = required_text(node, "name")?;
    let parse = || -> Result<SceneObject> {
        Ok(SceneObject {
            name: name.clone(),
            tag: optional_text(node, "tag").unwrap_or_default(),
            position: parse_vec3(optional_text(node, "position"), Vec3::ZERO)?,
            rotation: parse_vec3(optional_text(node, "rotation"), Vec3::ZERO)?,
            mesh: child(node, "mesh").map(|mesh| parse_mesh(&mesh)).transpose()?,
        })
    };
    parse().with_context(|| format!("invalid object {name}"))
}

fn parse_mesh(node: &Node<'_, '_>) -> Result<MeshDescription> {
    let source = match optional_text(node, "cube") {
        Some(value) => MeshSource::Cube {
            half_extent: parse_f32(Some(value), 0.5)?,
        },
        None => parse_inline_mesh(node)?,
    };

    let mut skeleton = Vec::new();
    if let Some(bones) = child(node, "skeleton") {
        for bone in bones.children().filter(|n| n.has_tag_name("bone")) {
            let parent = bone
                .attribute("parent")
                .map(|value| parse_number::<usize>(value, "parent"))
                .transpose()?;
            let position = parse_vec3(bone.text().map(str::to_string), Vec3::ZERO)?;
            let rotation = match bone.attribute("rotation") {
                Some(value) => {
                    let [w, x, y, z] = parse_components::<f32, 4>(value, "bone rotation")?;
                    Quaternion::new(w, x, y, z)
                }
                None => Quaternion::IDENTITY,
            };
            skeleton.push(BoneDescription {
                parent,
                position,
                rotation,
            });
        }
    }

    Ok(MeshDescription {
        source,
        texture: optional_text(node, "texture"),
        skeleton,
        animation: optional_text(node, "animation"),
    })
}

fn parse_inline_mesh(node: &Node<'_, '_>) -> Result<MeshSource> {
    let mut vertices = Vec::new();
    let mut bone_for_vertex = Vec::new();
    for vertex in node.children().filter(|n| n.has_tag_name("vertex")) {
        let [x, y, z] = parse_components::<f32, 3>(vertex.text().unwrap_or_default(), "vertex")?;
        vertices.push(Vec3::new(x, y, z));
        let bone = vertex
            .attribute("bone")
            .map(|value| parse_number::<u8>(value, "bone"))
            .transpose()?
            .unwrap_or(0);
        bone_for_vertex.push(bone);
    }
    if vertices.is_empty() {
        bail!("mesh has neither <cube> nor <vertex> elements");
    }

    let mut faces = Vec::new();
    for face in node.children().filter(|n| n.has_tag_name("face")) {
        let indices = parse_components::<u16, 4>(face.text().unwrap_or_default(), "face")?;
        let uvs = face
            .attribute("uvs")
            .map(|value| parse_components::<u16, 4>(value, "face uvs"))
            .transpose()?;
        faces.push(Face {
            vertices: indices,
            uvs,
        });
    }

    let mut uvs = Vec::new();
    for uv in node.children().filter(|n| n.has_tag_name("uv")) {
        let [u, v] = parse_components::<u8, 2>(uv.text().unwrap_or_default(), "uv")?;
        uvs.push(TexCoord::new(u, v));
    }

    let mut colours = Vec::new();
    for colour in node.children().filter(|n| n.has_tag_name("colour")) {
        colours.push(parse_colour(colour.text().map(str::to_string), Colour::NEUTRAL)?);
    }

    Ok(MeshSource::Inline {
        vertices,
        faces,
        uvs,
        colours,
        bone_for_vertex,
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn required_attribute(node: &Node<'_, '_>, name: &str, element: &str) -> Result<String> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("<{element}> is missing the {name} attribute"))
}

fn parse_number<T>(value: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("failed to parse {what} from {value:?}"))
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_int<T: TryFrom<u32>>(value: &str, what: &str) -> Result<T> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    }
    .with_context(|| format!("failed to parse {what} from {value:?}"))?;
    T::try_from(parsed).map_err(|_| anyhow!("{what} {parsed} is out of range"))
}

fn parse_components<T, const N: usize>(value: &str, what: &str) -> Result<[T; N]>
where
    T: FromStr + Copy + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let mut out = [T::default(); N];
    let mut components = value.split_whitespace();
    for slot in out.iter_mut() {
        let component = components
            .next()
            .ok_or_else(|| anyhow!("{what} is missing components, expected {N}"))?;
        *slot = parse_number(component, what)?;
    }
    if components.next().is_some() {
        bail!("{what} has more than {N} components");
    }
    Ok(out)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let [x, y, z] = parse_components::<f32, 3>(&value, "vector")?;
    Ok(Vec3::new(x, y, z))
}

fn parse_colour(value: Option<String>, default: Colour) -> Result<Colour> {
    let Some(value) = value else {
        return Ok(default);
    };
    let [r, g, b] = parse_components::<u8, 3>(&value, "colour")?;
    Ok(Colour::new(r, g, b))
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .trim()
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <renderer>
            <table_size>512</table_size>
            <depth_range>32</depth_range>
            <background>0 0 0</background>
            <debug_bones>true</debug_bones>
        </renderer>
        <camera>
            <mode>follow</mode>
            <target>Hero</target>
            <distance>6</distance>
            <offset>0 1.5</offset>
        </camera>
        <texture name="skin">
            <tpage>0x0012</tpage>
            <clut>480</clut>
            <uv_offset>64 0</uv_offset>
            <height>64</height>
        </texture>
        <animation name="wave" loop="true">
            <track joint="1">
                <key frame="0" />
                <key frame="10" axis="1 0 0" angle="90" />
            </track>
            <track joint="1" kind="translation">
                <key frame="0">0 0 0</key>
            </track>
            <marker frame="5">peak</marker>
        </animation>
        <object>
            <name>Hero</name>
            <tag>player</tag>
            <position>0 0 4</position>
            <mesh>
                <vertex bone="0">-1 -1 0</vertex>
                <vertex bone="0">1 -1 0</vertex>
                <vertex bone="1">-1 1 0</vertex>
                <vertex bone="1">1 1 0</vertex>
                <uv>0 63</uv>
                <uv>63 63</uv>
                <uv>0 0</uv>
                <uv>63 0</uv>
                <face uvs="0 1 2 3">0 1 2 3</face>
                <texture>skin</texture>
                <skeleton>
                    <bone>0 0 0</bone>
                    <bone parent="0">0 1 0</bone>
                </skeleton>
                <animation>wave</animation>
            </mesh>
        </object>
        <object>
            <name>Crate</name>
            <rotation>0 45 0</rotation>
            <mesh><cube>0.25</cube></mesh>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_every_section() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.renderer.ordering_table_size, 512);
        assert_eq!(scene.renderer.depth_range, 32.0);
        assert_eq!(scene.renderer.background, Colour::new(0, 0, 0));
        assert!(scene.renderer.debug_bones);
        assert_eq!(scene.renderer.fragment_capacity, 1024);

        assert_eq!(scene.camera.mode, CameraMode::Follow);
        assert_eq!(scene.camera.target.as_deref(), Some("Hero"));
        assert_eq!(scene.camera.offset, Vec2::new(0.0, 1.5));

        let texture = &scene.textures[0];
        assert_eq!(texture.name, "skin");
        assert_eq!(texture.page.tpage, 0x12);
        assert_eq!(texture.page.clut, Some(480));
        assert_eq!(texture.page.uv_offset, TexCoord::new(64, 0));

        assert_eq!(scene.objects.len(), 2);
        let crate_object = &scene.objects[1];
        assert_eq!(crate_object.rotation, Vec3::new(0.0, 45.0, 0.0));
        assert_eq!(
            crate_object.mesh.as_ref().unwrap().source,
            MeshSource::Cube { half_extent: 0.25 }
        );
    }

    #[test]
    fn animation_length_defaults_to_last_key() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        let wave = &scene.animations[0];
        assert_eq!(wave.name(), "wave");
        assert!(wave.is_looped());
        assert_eq!(wave.length(), 11);
        assert_eq!(wave.tracks().len(), 2);
        assert_eq!(wave.markers()[0].name, "peak");
        let first = wave.tracks()[0].keys()[0];
        assert_eq!(first.value, crate::animation::KeyValue::Rotation(Quaternion::IDENTITY));
    }

    #[test]
    fn inline_mesh_keeps_bindings_and_skeleton() {
        let scene = Scene::from_xml(SAMPLE).unwrap();
        let mesh = scene.objects[0].mesh.as_ref().unwrap();
        let MeshSource::Inline {
            vertices,
            faces,
            uvs,
            bone_for_vertex,
            ..
        } = &mesh.source
        else {
            panic!("expected an inline mesh");
        };
        assert_eq!(vertices.len(), 4);
        assert_eq!(bone_for_vertex, &vec![0, 0, 1, 1]);
        assert_eq!(faces[0], Face::textured([0, 1, 2, 3], [0, 1, 2, 3]));
        assert_eq!(uvs.len(), 4);
        assert_eq!(mesh.skeleton.len(), 2);
        assert_eq!(mesh.skeleton[1].parent, Some(0));
        assert_eq!(mesh.animation.as_deref(), Some("wave"));
        assert_eq!(mesh.texture.as_deref(), Some("skin"));
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><tag>mesh</tag></object></scene>";
        assert!(Scene::from_xml(bad).is_err());
    }

    #[test]
    fn follow_camera_requires_a_target() {
        let bad = "<scene><camera><mode>follow</mode></camera></scene>";
        let err = Scene::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("target"));
    }

    #[test]
    fn invalid_renderer_values_are_rejected() {
        let bad = "<scene><renderer><table_size>0</table_size></renderer></scene>";
        let err = Scene::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("ordering table size"));
    }

    #[test]
    fn unordered_keys_are_reported_with_the_animation_name() {
        let bad = r#"<scene><animation name="broken">
            <track joint="0"><key frame="5"/><key frame="2"/></track>
        </animation></scene>"#;
        let err = Scene::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
    }

    #[test]
    fn key_on_the_last_representable_frame_does_not_overflow_length() {
        let xml = r#"<scene><animation name="long">
            <track joint="0"><key frame="4294967295"/></track>
        </animation></scene>"#;
        let scene = Scene::from_xml(xml).unwrap();
        assert_eq!(scene.animations[0].length(), u32::MAX);
    }

    #[test]
    fn component_count_is_checked() {
        assert!(parse_components::<f32, 3>("1 2", "vector").is_err());
        assert!(parse_components::<f32, 3>("1 2 3 4", "vector").is_err());
        assert_eq!(parse_components::<u8, 2>("7 9", "uv").unwrap(), [7, 9]);
        assert_eq!(parse_int::<u16>("0x7c00", "clut").unwrap(), 0x7c00);
        assert!(parse_int::<u8>("300", "u").is_err());
    }
}
