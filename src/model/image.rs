use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::k8s::StreamImage;

/// Placeholder for image attributes that could not be determined
pub const NOT_AVAILABLE: &str = "NA";

/// Marker of a content-digest image reference
const DIGEST_MARKER: &str = "@sha";

/// Label of the docker image config carrying the semantic version
const VERSION_LABEL: &str = "version";

/// Returns true when the reference is pinned by digest and resolved through an image stream
pub fn is_image_stream_reference(reference: &str) -> bool {
  reference.contains(DIGEST_MARKER)
}

/// Strips the registry/repository path and the tag from an image path
fn short_name(path: &str) -> &str {
  let name = match path.rsplit_once('/') {
    Some((_, name)) => name,
    None => path,
  };
  match name.rsplit_once(':') {
    Some((name, _)) => name,
    None => name,
  }
}

/// Subset of the docker image metadata embedded in an OpenShift image
#[derive(Debug, Default, Deserialize)]
struct DockerImage {
  #[serde(rename = "Config")]
  config: Option<DockerImageConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct DockerImageConfig {
  #[serde(rename = "Labels")]
  labels: Option<BTreeMap<String, String>>,
}

/// Reads the version label out of the embedded docker image metadata
fn metadata_version(image_path: &str, image: &StreamImage) -> String {
  let Some(metadata) = &image.docker_image_metadata else {
    warn!("No DockerImageMetadata for {image_path}");
    return NOT_AVAILABLE.to_string();
  };

  match DockerImage::deserialize(metadata) {
    Ok(docker) => {
      let labels = docker.config.and_then(|c| c.labels).unwrap_or_default();
      debug!("Config.Labels for {image_path}: {labels:?}");
      labels
        .get(VERSION_LABEL)
        .cloned()
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
    Err(err) => {
      warn!("Cannot decode DockerImageMetadata for {image_path}: {err}");
      NOT_AVAILABLE.to_string()
    }
  }
}

/// A container image resolved to a name and a version
#[derive(Clone, Debug, PartialEq)]
pub enum ApplicationImage {
  /// Plain `registry/repository/name:tag` reference, parsed from the string alone
  ByRegistry { full_name: String },
  /// Digest reference resolved through an OpenShift image stream
  ByImageStream {
    full_name: String,
    image_path: String,
    version: String,
  },
}

impl ApplicationImage {
  pub fn by_registry(reference: impl Into<String>) -> Self {
    ApplicationImage::ByRegistry {
      full_name: reference.into(),
    }
  }

  /// Resolves a digest reference with the image stream object it points to
  ///
  /// The image path is the stream's docker image reference when it has one, else
  /// the raw reference, in both cases without its `@...` digest. The version is the
  /// tag of that path, or the `version` label of the embedded metadata for untagged paths
  pub fn by_image_stream(reference: impl Into<String>, image: &StreamImage) -> Self {
    let full_name = reference.into();
    let source = match image.docker_image_reference.as_str() {
      "" => full_name.as_str(),
      docker_reference => docker_reference,
    };
    let image_path = source.split('@').next().unwrap_or_default().to_string();

    let version = if image_path.rfind(':') > image_path.rfind('/') {
      image_path.rsplit_once(':').map(|(_, tag)| tag.to_string()).unwrap_or_default()
    } else {
      metadata_version(&image_path, image)
    };
    debug!("Image version of {source} is {version}");

    ApplicationImage::ByImageStream {
      full_name,
      image_path,
      version,
    }
  }

  /// The reference as declared by the container
  pub fn full_name(&self) -> &str {
    match self {
      ApplicationImage::ByRegistry { full_name } | ApplicationImage::ByImageStream { full_name, .. } => full_name,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      ApplicationImage::ByRegistry { full_name } => short_name(full_name),
      ApplicationImage::ByImageStream { image_path, .. } => short_name(image_path),
    }
  }

  pub fn version(&self) -> &str {
    match self {
      ApplicationImage::ByRegistry { full_name } => match full_name.rsplit_once(':') {
        Some((_, version)) => version,
        None => NOT_AVAILABLE,
      },
      ApplicationImage::ByImageStream { version, .. } => version,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const DIGEST: &str = "sha256:5f2b1a7c";

  fn stream_image(reference: &str, metadata: Option<serde_json::Value>) -> StreamImage {
    StreamImage {
      docker_image_reference: reference.to_string(),
      docker_image_metadata: metadata,
    }
  }

  // ── Strategy selection ─────────────────────────────────────────────

  #[test]
  fn digest_references_select_image_stream() {
    assert!(is_image_stream_reference(&format!("image-registry.svc:5000/ns1/app@{DIGEST}")));
    assert!(!is_image_stream_reference("registry.io/ns/app:1.2.3"));
    assert!(!is_image_stream_reference("registry.io/ns/app"));
    assert!(!is_image_stream_reference("registry.io/ns/app@md5:1234"));
  }

  // ── Registry references ────────────────────────────────────────────

  #[test]
  fn registry_reference_with_tag() {
    let image = ApplicationImage::by_registry("registry.io/ns/app:1.2.3");
    assert_eq!(image.name(), "app");
    assert_eq!(image.version(), "1.2.3");
    assert_eq!(image.full_name(), "registry.io/ns/app:1.2.3");
  }

  #[test]
  fn registry_reference_without_tag() {
    let image = ApplicationImage::by_registry("registry.io/ns/app");
    assert_eq!(image.name(), "app");
    assert_eq!(image.version(), NOT_AVAILABLE);
  }

  #[test]
  fn bare_image_name() {
    let image = ApplicationImage::by_registry("nginx:1.25");
    assert_eq!(image.name(), "nginx");
    assert_eq!(image.version(), "1.25");
  }

  // ── Image stream references ────────────────────────────────────────

  #[test]
  fn image_stream_tag_in_path() {
    let reference = format!("image-registry.svc:5000/ns1/app:2.0@{DIGEST}");
    let image = ApplicationImage::by_image_stream(&reference, &StreamImage::default());
    assert_eq!(image.name(), "app");
    assert_eq!(image.version(), "2.0");
    assert_eq!(image.full_name(), reference);
  }

  #[test]
  fn image_stream_without_tag_or_metadata() {
    let reference = format!("image-registry.svc:5000/ns1/app@{DIGEST}");
    let image = ApplicationImage::by_image_stream(&reference, &StreamImage::default());
    assert_eq!(image.name(), "app");
    assert_eq!(image.version(), NOT_AVAILABLE);
  }

  #[test]
  fn image_stream_version_from_metadata_label() {
    let reference = format!("image-registry.svc:5000/ns1/app@{DIGEST}");
    let metadata = json!({ "Config": { "Labels": { "version": "4.12.1", "vendor": "acme" } } });
    let image = ApplicationImage::by_image_stream(&reference, &stream_image("", Some(metadata)));
    assert_eq!(image.name(), "app");
    assert_eq!(image.version(), "4.12.1");
  }

  #[test]
  fn image_stream_metadata_without_version_label() {
    let reference = format!("image-registry.svc:5000/ns1/app@{DIGEST}");
    let metadata = json!({ "Config": { "Labels": { "vendor": "acme" } } });
    let image = ApplicationImage::by_image_stream(&reference, &stream_image("", Some(metadata)));
    assert_eq!(image.version(), NOT_AVAILABLE);

    let metadata = json!({ "Config": { "Labels": null } });
    let image = ApplicationImage::by_image_stream(&reference, &stream_image("", Some(metadata)));
    assert_eq!(image.version(), NOT_AVAILABLE);
  }

  #[test]
  fn image_stream_malformed_metadata() {
    let reference = format!("image-registry.svc:5000/ns1/app@{DIGEST}");
    let image = ApplicationImage::by_image_stream(&reference, &stream_image("", Some(json!("not an object"))));
    assert_eq!(image.version(), NOT_AVAILABLE);
  }

  #[test]
  fn image_stream_prefers_docker_image_reference() {
    let reference = format!("image-registry.svc:5000/ns1/app@{DIGEST}");
    let image = ApplicationImage::by_image_stream(
      &reference,
      &stream_image(&format!("quay.io/acme/backend:7.1@{DIGEST}"), None),
    );
    assert_eq!(image.name(), "backend");
    assert_eq!(image.version(), "7.1");
    assert_eq!(image.full_name(), reference);
  }
}
