use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene() -> NamedTempFile {
    let scene = r#"<scene>
  <renderer>
    <depth_range>16</depth_range>
  </renderer>
  <camera>
    <position>0 0 -4</position>
  </camera>
  <animation name="bob" loop="true" length="4">
    <track joint="1">
      <key frame="0" />
      <key frame="2" axis="0 0 1" angle="30" />
    </track>
    <marker frame="2">top</marker>
  </animation>
  <object>
    <name>Cube</name>
    <tag>prop</tag>
    <mesh>
      <cube>0.5</cube>
      <skeleton>
        <bone>0 0 0</bone>
        <bone parent="0">0 -1 0</bone>
      </skeleton>
      <animation>bob</animation>
    </mesh>
  </object>
</scene>
"#;
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(scene.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn cli_renders_frames_and_prints_final_state() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("madnight-runtime").expect("binary exists");
    cmd.arg(scene.path())
        .args(["--frames", "3", "--delta", "1", "--summary-only"]);
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 1 objects (1 animations)"))
        .stdout(contains(" - Cube (prop)"))
        .stdout(contains("marker top of bob on Cube at frame 2"))
        .stdout(contains("Rendered 3 frames: 3 primitives submitted, 15 back facing"))
        .stdout(contains(" - Cube pos=(0.00, 0.00, 0.00) rot=(0.00, 0.00, 0.00) anim=bob@3"));
}

#[test]
fn cli_prints_per_frame_stats_by_default() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("madnight-runtime").expect("binary exists");
    cmd.arg(scene.path()).args(["--frames", "2"]);
    cmd.assert()
        .success()
        .stdout(contains("frame 0: 1 primitives, 5 rejected, 0 dropped"))
        .stdout(contains("frame 1: 1 primitives"));
}

#[test]
fn cli_requires_a_scene_path() {
    let mut cmd = Command::cargo_bin("madnight-runtime").expect("binary exists");
    cmd.assert().failure().stderr(contains("Usage: madnight-runtime"));
}

#[test]
fn cli_reports_bad_scenes() {
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(b"<scene><object><tag>nameless</tag></object></scene>")
        .expect("write scene");
    let mut cmd = Command::cargo_bin("madnight-runtime").expect("binary exists");
    cmd.arg(tmp.path());
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse scene XML"));
}
