use crate::SceneError;
use glam::Vec3;
use multiworld_common::{Pose, Twist};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of a scene descriptor tree.
///
/// Attributes live in a BTreeMap so serialized descriptors are canonical:
/// two equal subtrees always produce the same descriptor string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SceneElement>,
}

impl SceneElement {
    /// Create an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: SceneElement) -> Self {
        self.children.push(child);
        self
    }

    /// First child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&SceneElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut SceneElement> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    pub fn has_child(&self, tag: &str) -> bool {
        self.child(tag).is_some()
    }

    /// All children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a SceneElement> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Append a subtree as the last child.
    pub fn insert_child(&mut self, child: SceneElement) {
        self.children.push(child);
    }

    /// Overwrite this node's content with `other`'s, in place.
    ///
    /// The node keeps its position among its parent's children; the tag is
    /// taken from `other` as well.
    pub fn copy_from(&mut self, other: &SceneElement) {
        self.tag.clone_from(&other.tag);
        self.attributes.clone_from(&other.attributes);
        self.text.clone_from(&other.text);
        self.children.clone_from(&other.children);
    }

    /// Trimmed text of the named child.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).and_then(|c| c.text.as_deref()).map(str::trim)
    }

    /// Serialize this subtree into a descriptor fragment.
    pub fn to_descriptor_string(&self) -> Result<String, SceneError> {
        serde_json::to_string(self).map_err(|e| SceneError::Parse(e.to_string()))
    }

    /// Parse a descriptor fragment back into a subtree.
    pub fn from_descriptor_str(fragment: &str) -> Result<Self, SceneError> {
        serde_json::from_str(fragment).map_err(|e| SceneError::Parse(e.to_string()))
    }

    /// Parse the `pose` child, `"x y z roll pitch yaw"`.
    pub fn pose(&self) -> Result<Option<Pose>, SceneError> {
        let Some(text) = self.child_text("pose") else {
            return Ok(None);
        };
        let v = parse_floats::<6>("pose", text)?;
        Ok(Some(Pose::from_xyz_rpy(v[0], v[1], v[2], v[3], v[4], v[5])))
    }

    /// Parse the `velocity` child, `"vx vy vz"` or `"vx vy vz wx wy wz"`.
    pub fn velocity(&self) -> Result<Option<Twist>, SceneError> {
        let Some(text) = self.child_text("velocity") else {
            return Ok(None);
        };
        if text.split_whitespace().count() == 3 {
            let v = parse_floats::<3>("velocity", text)?;
            return Ok(Some(Twist::linear(Vec3::from_array(v))));
        }
        let v = parse_floats::<6>("velocity", text)?;
        Ok(Some(Twist {
            linear: Vec3::new(v[0], v[1], v[2]),
            angular: Vec3::new(v[3], v[4], v[5]),
        }))
    }

    /// Parse a child holding three whitespace-separated numbers.
    pub fn vec3_child(&self, tag: &str) -> Result<Option<Vec3>, SceneError> {
        match self.child_text(tag) {
            Some(text) => Ok(Some(Vec3::from_array(parse_floats::<3>(tag, text)?))),
            None => Ok(None),
        }
    }

    /// Parse a child holding one number.
    pub fn f64_child(&self, tag: &str) -> Result<Option<f64>, SceneError> {
        match self.child_text(tag) {
            Some(text) => text.parse().map(Some).map_err(|_| invalid(tag, text)),
            None => Ok(None),
        }
    }

    /// Parse a child holding `true`/`false` (or `1`/`0`).
    pub fn bool_child(&self, tag: &str) -> Result<Option<bool>, SceneError> {
        match self.child_text(tag) {
            Some("true" | "1") => Ok(Some(true)),
            Some("false" | "0") => Ok(Some(false)),
            Some(other) => Err(invalid(tag, other)),
            None => Ok(None),
        }
    }
}

fn parse_floats<const N: usize>(tag: &str, text: &str) -> Result<[f32; N], SceneError> {
    let mut out = [0.0; N];
    let mut parts = text.split_whitespace();
    for slot in &mut out {
        let part = parts.next().ok_or_else(|| invalid(tag, text))?;
        *slot = part.parse().map_err(|_| invalid(tag, text))?;
    }
    if parts.next().is_some() {
        return Err(invalid(tag, text));
    }
    Ok(out)
}

fn invalid(tag: &str, value: &str) -> SceneError {
    SceneError::InvalidValue {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_model() -> SceneElement {
        SceneElement::new("model")
            .with_attribute("name", "box")
            .with_child(SceneElement::new("pose").with_text("1 2 3 0 0 0"))
            .with_child(SceneElement::new("static").with_text("true"))
    }

    #[test]
    fn child_lookup_by_tag() {
        let m = box_model();
        assert!(m.has_child("pose"));
        assert!(!m.has_child("link"));
        assert_eq!(m.attribute("name"), Some("box"));
        assert_eq!(m.bool_child("static").unwrap(), Some(true));
    }

    #[test]
    fn pose_parses() {
        let pose = box_model().pose().unwrap().unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn malformed_pose_is_an_error() {
        let m = SceneElement::new("model").with_child(SceneElement::new("pose").with_text("1 2"));
        assert!(matches!(m.pose(), Err(SceneError::InvalidValue { .. })));
    }

    #[test]
    fn velocity_accepts_linear_only() {
        let m = SceneElement::new("model")
            .with_child(SceneElement::new("velocity").with_text("1 0 0"));
        let twist = m.velocity().unwrap().unwrap();
        assert_eq!(twist.linear, Vec3::X);
        assert_eq!(twist.angular, Vec3::ZERO);
    }

    #[test]
    fn descriptor_string_is_parseable() {
        let m = box_model();
        let s = m.to_descriptor_string().unwrap();
        assert_eq!(SceneElement::from_descriptor_str(&s).unwrap(), m);
    }

    #[test]
    fn copy_from_replaces_in_place() {
        let mut world = SceneElement::new("world")
            .with_child(SceneElement::new("physics").with_attribute("type", "ode"))
            .with_child(box_model());
        let replacement = SceneElement::new("physics")
            .with_attribute("type", "bullet")
            .with_child(SceneElement::new("max_step_size").with_text("0.002"));
        world.child_mut("physics").unwrap().copy_from(&replacement);

        assert_eq!(world.children[0].attribute("type"), Some("bullet"));
        assert_eq!(world.children[0].f64_child("max_step_size").unwrap(), Some(0.002));
        assert_eq!(world.children[1].tag, "model");
    }
}
