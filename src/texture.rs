use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fragment::TexCoord;

/// Opaque id of a texture resident in video memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

/// Everything a textured quad needs to sample a resident texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexturePage {
    /// Packed page attribute word.
    pub tpage: u16,
    /// Packed palette location, when the texture is paletted.
    #[serde(default)]
    pub clut: Option<u16>,
    /// Texture origin within its page.
    pub uv_offset: TexCoord,
    /// Height in texels, used to flip V.
    pub height: u16,
}

impl TexturePage {
    /// Maps a mesh UV to page coordinates. Mesh V runs bottom-up, page V
    /// runs top-down.
    pub fn map_uv(&self, uv: TexCoord) -> TexCoord {
        let flipped = i32::from(self.height) - 1 - i32::from(uv.v);
        TexCoord {
            u: self.uv_offset.u.wrapping_add(uv.u),
            v: (i32::from(self.uv_offset.v) + flipped) as u8,
        }
    }
}

/// Resolves texture handles for the renderer.
pub trait TextureProvider {
    fn page(&self, handle: TextureHandle) -> Option<TexturePage>;
}

/// In-memory table of resident textures, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct TextureAtlas {
    pages: Vec<TexturePage>,
    names: HashMap<String, TextureHandle>,
}

impl TextureAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, page: TexturePage) -> TextureHandle {
        let name = name.into();
        if let Some(handle) = self.names.get(&name) {
            self.pages[handle.0 as usize] = page;
            return *handle;
        }
        let handle = TextureHandle(self.pages.len() as u32);
        self.pages.push(page);
        self.names.insert(name, handle);
        handle
    }

    pub fn handle(&self, name: &str) -> Option<TextureHandle> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl TextureProvider for TextureAtlas {
    fn page(&self, handle: TextureHandle) -> Option<TexturePage> {
        self.pages.get(handle.0 as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(height: u16) -> TexturePage {
        TexturePage {
            tpage: 0x0215,
            clut: Some(0x7c00),
            uv_offset: TexCoord::new(64, 0),
            height,
        }
    }

    #[test]
    fn v_is_flipped_against_texture_height() {
        let page = page(64);
        assert_eq!(page.map_uv(TexCoord::new(0, 0)), TexCoord::new(64, 63));
        assert_eq!(page.map_uv(TexCoord::new(10, 63)), TexCoord::new(74, 0));
    }

    #[test]
    fn atlas_resolves_by_name_and_handle() {
        let mut atlas = TextureAtlas::new();
        let crate_handle = atlas.insert("crate", page(32));
        let wall = atlas.insert("wall", page(64));
        assert_ne!(crate_handle, wall);
        assert_eq!(atlas.handle("wall"), Some(wall));
        assert_eq!(atlas.page(wall).unwrap().height, 64);
        assert!(atlas.page(TextureHandle(9)).is_none());
    }

    #[test]
    fn reinserting_a_name_replaces_the_page() {
        let mut atlas = TextureAtlas::new();
        let first = atlas.insert("crate", page(32));
        let second = atlas.insert("crate", page(16));
        assert_eq!(first, second);
        assert_eq!(atlas.len(), 1);
        assert_eq!(atlas.page(first).unwrap().height, 16);
    }
}
