use crate::{SceneElement, SceneError};
use std::path::{Path, PathBuf};

/// Colon-separated list of directories searched for scene files.
pub const RESOURCE_PATH_ENV: &str = "MULTIWORLD_RESOURCE_PATH";

/// Engine used when a world does not declare one.
pub const DEFAULT_ENGINE: &str = "ode";

/// Resolve a scene file, searching [`RESOURCE_PATH_ENV`] when the path does
/// not exist as given.
pub fn locate(file: impl AsRef<Path>) -> Result<PathBuf, SceneError> {
    let search: Vec<PathBuf> = std::env::var_os(RESOURCE_PATH_ENV)
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default();
    locate_in(file, &search)
}

/// Resolve a scene file against an explicit list of search directories.
pub fn locate_in(file: impl AsRef<Path>, search: &[PathBuf]) -> Result<PathBuf, SceneError> {
    let file = file.as_ref();
    if file.is_file() {
        return Ok(file.to_path_buf());
    }
    if file.is_relative() {
        for dir in search {
            let candidate = dir.join(file);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(SceneError::NotFound(file.to_path_buf()))
}

fn read_root(file: &Path) -> Result<SceneElement, SceneError> {
    let path = locate(file)?;
    let data = std::fs::read_to_string(&path)?;
    let root: SceneElement =
        serde_yaml::from_str(&data).map_err(|e| SceneError::Parse(format!("{}: {e}", path.display())))?;
    if root.tag != "sdf" {
        return Err(SceneError::Parse(format!(
            "{}: root element is <{}>, expected <sdf>",
            path.display(),
            root.tag
        )));
    }
    Ok(root)
}

/// Read the `world` element of a scene file, renaming it when `name` is given.
pub fn read_world(file: impl AsRef<Path>, name: Option<&str>) -> Result<SceneElement, SceneError> {
    let root = read_root(file.as_ref())?;
    let mut world = root
        .children
        .into_iter()
        .find(|c| c.tag == "world")
        .ok_or(SceneError::MissingElement("world"))?;
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        set_world_name(&mut world, name);
    }
    Ok(world)
}

/// Read the `physics` element of a scene file's world.
pub fn read_physics(file: impl AsRef<Path>) -> Result<SceneElement, SceneError> {
    let world = read_world(file, None)?;
    world
        .child("physics")
        .cloned()
        .ok_or(SceneError::MissingElement("physics"))
}

/// Replace the world's physics with `physics`, inserting it when the world
/// has none. The rest of the world is left unchanged.
pub fn override_physics(world: &mut SceneElement, physics: &SceneElement) {
    match world.child_mut("physics") {
        Some(existing) => {
            tracing::debug!(
                engine = physics.attribute("type").unwrap_or("<untyped>"),
                "overriding existing physics"
            );
            existing.copy_from(physics);
        }
        None => world.insert_child(physics.clone()),
    }
}

/// Rename a world, returning the previous name.
pub fn set_world_name(world: &mut SceneElement, name: &str) -> Option<String> {
    let old = world.attribute("name").map(str::to_string);
    if old.as_deref() != Some(name) {
        tracing::info!(
            from = old.as_deref().unwrap_or(""),
            to = name,
            "replacing world name"
        );
        world.set_attribute("name", name);
    }
    old
}

pub fn world_name(world: &SceneElement) -> Option<&str> {
    world.attribute("name")
}

/// Engine declared by the world's physics, or [`DEFAULT_ENGINE`].
pub fn declared_engine(world: &SceneElement) -> &str {
    world
        .child("physics")
        .and_then(|p| p.attribute("type"))
        .unwrap_or(DEFAULT_ENGINE)
}

/// A world with no entities and default physics.
pub fn empty_world(name: &str) -> SceneElement {
    SceneElement::new("world").with_attribute("name", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
tag: sdf
attributes: { version: "1.6" }
children:
  - tag: world
    attributes: { name: default }
    children:
      - tag: physics
        attributes: { type: bullet }
        children:
          - { tag: max_step_size, text: "0.002" }
      - tag: model
        attributes: { name: box }
        children:
          - { tag: pose, text: "0 0 1 0 0 0" }
"#;

    fn write_scene(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn read_world_renames() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_scene(tmp.path(), "one.yaml", SCENE);

        let world = read_world(&path, Some("world_0")).unwrap();
        assert_eq!(world_name(&world), Some("world_0"));
        assert_eq!(declared_engine(&world), "bullet");
        assert!(world.child("model").is_some());
    }

    #[test]
    fn read_world_keeps_name_without_override() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_scene(tmp.path(), "one.yaml", SCENE);
        let world = read_world(&path, None).unwrap();
        assert_eq!(world_name(&world), Some("default"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = read_world("definitely/missing.yaml", None).unwrap_err();
        assert!(matches!(err, SceneError::NotFound(_)));
    }

    #[test]
    fn locate_searches_paths() {
        let tmp = tempfile::tempdir().unwrap();
        write_scene(tmp.path(), "found.yaml", SCENE);
        let found = locate_in("found.yaml", &[tmp.path().to_path_buf()]).unwrap();
        assert!(found.ends_with("found.yaml"));
        assert!(locate_in("other.yaml", &[tmp.path().to_path_buf()]).is_err());
    }

    #[test]
    fn parse_failure_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_scene(tmp.path(), "bad.yaml", "tag: [unterminated");
        assert!(matches!(read_world(&path, None), Err(SceneError::Parse(_))));
    }

    #[test]
    fn read_physics_requires_physics() {
        let tmp = tempfile::tempdir().unwrap();
        let body = "tag: sdf\nchildren:\n  - tag: world\n    attributes: { name: w }\n";
        let path = write_scene(tmp.path(), "nophysics.yaml", body);
        assert!(matches!(
            read_physics(&path),
            Err(SceneError::MissingElement("physics"))
        ));
    }

    #[test]
    fn override_inserts_when_absent() {
        let mut world = empty_world("w").with_child(SceneElement::new("model"));
        let physics = SceneElement::new("physics").with_attribute("type", "dart");
        override_physics(&mut world, &physics);
        assert_eq!(declared_engine(&world), "dart");
        assert_eq!(world.children[0].tag, "model");
        assert_eq!(world.children.len(), 2);
    }

    #[test]
    fn override_replaces_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_scene(tmp.path(), "one.yaml", SCENE);
        let mut world = read_world(&path, None).unwrap();
        let physics = SceneElement::new("physics").with_attribute("type", "ode");
        override_physics(&mut world, &physics);
        assert_eq!(declared_engine(&world), "ode");
        assert_eq!(world.children_named("physics").count(), 1);
        assert!(world.child("physics").unwrap().child("max_step_size").is_none());
    }
}
