//! Record structures for the two JSON manifests describing a Visual Studio
//! release. Only the fields the extraction pipeline consumes are modeled;
//! the documents carry plenty more (signatures, localized resources,
//! install conditions) that deserde simply skips.

use std::collections::HashMap;

use serde::Deserialize;

/// The channel manifest served from `aka.ms/vs/<release>/release/channel`.
/// Its only job here is to point at the installer manifest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelManifest {
    #[serde(default)]
    pub info: ChannelInfo,
    #[serde(default)]
    pub channel_items: Vec<ChannelItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub id: String,
    #[serde(default)]
    pub payloads: Vec<Payload>,
}

/// One downloadable artifact of a package or channel item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub file_name: String,
    pub url: String,
}

/// The installer manifest: the full package graph of one VS release.
#[derive(Debug, Deserialize)]
pub struct InstallerManifest {
    #[serde(default)]
    pub packages: Vec<Package>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payloads: Vec<Payload>,
    /// Dependency package ids; the values (version constraints or nested
    /// objects) are opaque to the traversal.
    #[serde(default)]
    pub dependencies: HashMap<String, serde_json::Value>,
}
