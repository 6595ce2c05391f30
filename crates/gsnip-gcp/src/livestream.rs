//! Live Stream API snippets: inputs, channels, channel events and clips,
//! assets, and pools.
//!
//! API base: `https://livestream.googleapis.com/v1`
//!
//! Resource names are `projects/{p}/locations/{l}/{collection}/{id}`. Every
//! mutation except event creation is a long-running operation.

use crate::client::{Empty, GcpClient};
use crate::error::{Context, GcpResult};
use crate::operation::Operation;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write;

const SERVICE: &str = "livestream";
const V1: &str = "/v1";

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    #[serde(default)]
    pub name: String,
    /// RTMP_PUSH or SRT_PUSH.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Ingest URI the encoder pushes to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessing_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticFailover {
    #[serde(default)]
    pub input_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputAttachment {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_failover: Option<AutomaticFailover>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelOutput {
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_attachments: Vec<InputAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ChannelOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_input: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elementary_streams: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mux_streams: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_break: Option<serde_json::Value>,
    #[serde(default)]
    pub execute_now: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub output_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slices: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clip_manifests: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoAsset {
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub peered_network: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_config: Option<NetworkConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    inputs: Vec<Input>,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    clips: Vec<Clip>,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    next_page_token: Option<String>,
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn parent(project: &str, location: &str) -> String {
    format!("projects/{}/locations/{}", project, location)
}

fn input_name(project: &str, location: &str, input_id: &str) -> String {
    format!("{}/inputs/{}", parent(project, location), input_id)
}

fn channel_name(project: &str, location: &str, channel_id: &str) -> String {
    format!("{}/channels/{}", parent(project, location), channel_id)
}

/// Wait on `op` and unpack the resource in its response.
async fn finish<T: DeserializeOwned>(client: &GcpClient, op: Operation) -> GcpResult<T> {
    let done = client.wait_operation(SERVICE, V1, op).await.context("Wait")?;
    done.into_response(SERVICE).context("Wait")
}

async fn finish_empty(client: &GcpClient, op: Operation) -> GcpResult<()> {
    client.wait_operation(SERVICE, V1, op).await.context("Wait")?;
    Ok(())
}

async fn delete_resource(client: &GcpClient, name: &str, method: &str) -> GcpResult<()> {
    let op: Operation = client
        .delete(SERVICE, &format!("{}/{}", V1, name), &[])
        .await
        .context(method)?;
    finish_empty(client, op).await
}

/// The fixed 720p H.264 + AAC ladder with an HLS manifest.
fn channel_body(input_attachments: Vec<InputAttachment>, output_uri: &str) -> Channel {
    Channel {
        input_attachments,
        output: Some(ChannelOutput {
            uri: output_uri.to_string(),
        }),
        elementary_streams: vec![
            json!({
                "key": "es_video",
                "videoStream": {
                    "h264": {
                        "profile": "high",
                        "bitrateBps": 3000000,
                        "frameRate": 30,
                        "heightPixels": 720,
                        "widthPixels": 1280
                    }
                }
            }),
            json!({
                "key": "es_audio",
                "audioStream": {
                    "codec": "aac",
                    "channelCount": 2,
                    "bitrateBps": 160000
                }
            }),
        ],
        mux_streams: vec![
            json!({
                "key": "mux_video",
                "elementaryStreams": ["es_video"],
                "segmentSettings": { "segmentDuration": "2s" }
            }),
            json!({
                "key": "mux_audio",
                "elementaryStreams": ["es_audio"],
                "segmentSettings": { "segmentDuration": "2s" }
            }),
        ],
        manifests: vec![json!({
            "fileName": "manifest.m3u8",
            "type": "HLS",
            "key": "manifest_hls",
            "muxStreams": ["mux_video", "mux_audio"],
            "maxSegmentCount": 5
        })],
        // Needed for VOD clips.
        retention_config: Some(json!({ "retentionWindowDuration": "86400s" })),
        ..Default::default()
    }
}

// ── Inputs ──────────────────────────────────────────────────────────────

/// Create an RTMP push input.
pub async fn create_input(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    input_id: &str,
) -> GcpResult<Input> {
    let path = format!("{}/{}/inputs", V1, parent(project, location));
    let body = Input {
        input_type: Some("RTMP_PUSH".to_string()),
        ..Default::default()
    };
    let op: Operation = client
        .post_with_query(SERVICE, &path, &[("inputId", input_id)], &body)
        .await
        .context("CreateInput")?;
    let input: Input = finish(client, op).await?;
    writeln!(w, "Input: {}", input.name)?;
    Ok(input)
}

pub async fn list_inputs(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<Input>> {
    let path = format!("{}/{}/inputs", V1, parent(project, location));
    let inputs = client
        .get_all_pages(SERVICE, &path, &[], |p: ListPage| (p.inputs, p.next_page_token))
        .await
        .context("ListInputs")?;
    writeln!(w, "Inputs:")?;
    for input in &inputs {
        writeln!(w, "{}", input.name)?;
    }
    Ok(inputs)
}

pub async fn get_input(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    input_id: &str,
) -> GcpResult<Input> {
    let path = format!("{}/{}", V1, input_name(project, location, input_id));
    let input: Input = client.get(SERVICE, &path, &[]).await.context("GetInput")?;
    writeln!(w, "Input: {}", input.name)?;
    Ok(input)
}

/// Crop 5 px off the top and bottom of the input.
pub async fn update_input(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    input_id: &str,
) -> GcpResult<Input> {
    let path = format!("{}/{}", V1, input_name(project, location, input_id));
    let body = Input {
        preprocessing_config: Some(json!({ "crop": { "topPixels": 5, "bottomPixels": 5 } })),
        ..Default::default()
    };
    let op: Operation = client
        .patch(SERVICE, &path, &body, &[("updateMask", "preprocessingConfig")])
        .await
        .context("UpdateInput")?;
    let input: Input = finish(client, op).await?;
    writeln!(w, "Updated input: {}", input.name)?;
    Ok(input)
}

pub async fn delete_input(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    input_id: &str,
) -> GcpResult<()> {
    delete_resource(client, &input_name(project, location, input_id), "DeleteInput").await?;
    writeln!(w, "Deleted input")?;
    Ok(())
}

// ── Channels ────────────────────────────────────────────────────────────

async fn insert_channel(
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    channel: &Channel,
) -> GcpResult<Channel> {
    let path = format!("{}/{}/channels", V1, parent(project, location));
    let op: Operation = client
        .post_with_query(SERVICE, &path, &[("channelId", channel_id)], channel)
        .await
        .context("CreateChannel")?;
    finish(client, op).await
}

/// Create a channel fed by `input_id`, writing HLS output to `output_uri`
/// (e.g. `gs://my-bucket/my-output-folder/`).
pub async fn create_channel(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    input_id: &str,
    output_uri: &str,
) -> GcpResult<Channel> {
    let attachments = vec![InputAttachment {
        key: "my-input".to_string(),
        input: input_name(project, location, input_id),
        automatic_failover: None,
    }];
    let body = channel_body(attachments, output_uri);
    let channel = insert_channel(client, project, location, channel_id, &body).await?;
    writeln!(w, "Channel: {}", channel.name)?;
    Ok(channel)
}

/// Create a channel whose primary input fails over to a backup input.
pub async fn create_channel_with_backup_input(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    primary_input_id: &str,
    backup_input_id: &str,
    output_uri: &str,
) -> GcpResult<Channel> {
    let attachments = vec![
        InputAttachment {
            key: "my-primary-input".to_string(),
            input: input_name(project, location, primary_input_id),
            automatic_failover: Some(AutomaticFailover {
                input_keys: vec!["my-backup-input".to_string()],
            }),
        },
        InputAttachment {
            key: "my-backup-input".to_string(),
            input: input_name(project, location, backup_input_id),
            automatic_failover: None,
        },
    ];
    let body = channel_body(attachments, output_uri);
    let channel = insert_channel(client, project, location, channel_id, &body).await?;
    writeln!(w, "Channel: {}", channel.name)?;
    Ok(channel)
}

pub async fn list_channels(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<Channel>> {
    let path = format!("{}/{}/channels", V1, parent(project, location));
    let channels = client
        .get_all_pages(SERVICE, &path, &[], |p: ListPage| (p.channels, p.next_page_token))
        .await
        .context("ListChannels")?;
    writeln!(w, "Channels:")?;
    for channel in &channels {
        writeln!(w, "{}", channel.name)?;
    }
    Ok(channels)
}

pub async fn get_channel(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
) -> GcpResult<Channel> {
    let path = format!("{}/{}", V1, channel_name(project, location, channel_id));
    let channel: Channel = client.get(SERVICE, &path, &[]).await.context("GetChannel")?;
    writeln!(w, "Channel: {}", channel.name)?;
    Ok(channel)
}

/// Replace the channel's input attachments with a single `updated-input`.
pub async fn update_channel(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    input_id: &str,
) -> GcpResult<Channel> {
    let path = format!("{}/{}", V1, channel_name(project, location, channel_id));
    let body = Channel {
        input_attachments: vec![InputAttachment {
            key: "updated-input".to_string(),
            input: input_name(project, location, input_id),
            automatic_failover: None,
        }],
        ..Default::default()
    };
    let op: Operation = client
        .patch(SERVICE, &path, &body, &[("updateMask", "inputAttachments")])
        .await
        .context("UpdateChannel")?;
    let channel: Channel = finish(client, op).await?;
    writeln!(w, "Updated channel: {}", channel.name)?;
    Ok(channel)
}

pub async fn start_channel(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
) -> GcpResult<()> {
    let path = format!("{}/{}:start", V1, channel_name(project, location, channel_id));
    let op: Operation = client
        .post(SERVICE, &path, &json!({}))
        .await
        .context("StartChannel")?;
    finish_empty(client, op).await?;
    writeln!(w, "Started channel")?;
    Ok(())
}

pub async fn stop_channel(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
) -> GcpResult<()> {
    let path = format!("{}/{}:stop", V1, channel_name(project, location, channel_id));
    let op: Operation = client
        .post(SERVICE, &path, &json!({}))
        .await
        .context("StopChannel")?;
    finish_empty(client, op).await?;
    writeln!(w, "Stopped channel")?;
    Ok(())
}

pub async fn delete_channel(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
) -> GcpResult<()> {
    delete_resource(
        client,
        &channel_name(project, location, channel_id),
        "DeleteChannel",
    )
    .await?;
    writeln!(w, "Deleted channel")?;
    Ok(())
}

// ── Channel events ──────────────────────────────────────────────────────

/// Insert a 30 s ad break, executed immediately.
pub async fn create_channel_event(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    event_id: &str,
) -> GcpResult<Event> {
    let path = format!("{}/{}/events", V1, channel_name(project, location, channel_id));
    let body = Event {
        ad_break: Some(json!({ "duration": "30s" })),
        execute_now: true,
        ..Default::default()
    };
    let event: Event = client
        .post_with_query(SERVICE, &path, &[("eventId", event_id)], &body)
        .await
        .context("CreateEvent")?;
    writeln!(w, "Channel event: {}", event.name)?;
    Ok(event)
}

pub async fn list_channel_events(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
) -> GcpResult<Vec<Event>> {
    let path = format!("{}/{}/events", V1, channel_name(project, location, channel_id));
    let events = client
        .get_all_pages(SERVICE, &path, &[], |p: ListPage| (p.events, p.next_page_token))
        .await
        .context("ListEvents")?;
    writeln!(w, "Channel events:")?;
    for event in &events {
        writeln!(w, "{}", event.name)?;
    }
    Ok(events)
}

pub async fn get_channel_event(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    event_id: &str,
) -> GcpResult<Event> {
    let path = format!(
        "{}/{}/events/{}",
        V1,
        channel_name(project, location, channel_id),
        event_id
    );
    let event: Event = client.get(SERVICE, &path, &[]).await.context("GetEvent")?;
    writeln!(w, "Channel event: {}", event.name)?;
    Ok(event)
}

/// Events are deleted synchronously.
pub async fn delete_channel_event(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    event_id: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/{}/events/{}",
        V1,
        channel_name(project, location, channel_id),
        event_id
    );
    let _: Empty = client
        .delete(SERVICE, &path, &[])
        .await
        .context("DeleteEvent")?;
    writeln!(w, "Deleted channel event")?;
    Ok(())
}

// ── Channel clips ───────────────────────────────────────────────────────

/// Clip the last 20 seconds of the channel into `output_uri`.
pub async fn create_channel_clip(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    clip_id: &str,
    output_uri: &str,
) -> GcpResult<Clip> {
    let markout = Utc::now();
    let markin = markout - ChronoDuration::seconds(20);
    let body = Clip {
        output_uri: output_uri.to_string(),
        slices: vec![json!({
            "timeSlice": {
                "markinTime": markin.to_rfc3339_opts(SecondsFormat::Secs, true),
                "markoutTime": markout.to_rfc3339_opts(SecondsFormat::Secs, true)
            }
        })],
        clip_manifests: vec![json!({ "manifestKey": "manifest_hls" })],
        ..Default::default()
    };
    let path = format!("{}/{}/clips", V1, channel_name(project, location, channel_id));
    let op: Operation = client
        .post_with_query(SERVICE, &path, &[("clipId", clip_id)], &body)
        .await
        .context("CreateClip")?;
    let clip: Clip = finish(client, op).await?;
    writeln!(w, "Channel clip: {}", clip.name)?;
    Ok(clip)
}

pub async fn list_channel_clips(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
) -> GcpResult<Vec<Clip>> {
    let path = format!("{}/{}/clips", V1, channel_name(project, location, channel_id));
    let clips = client
        .get_all_pages(SERVICE, &path, &[], |p: ListPage| (p.clips, p.next_page_token))
        .await
        .context("ListClips")?;
    writeln!(w, "Channel clips:")?;
    for clip in &clips {
        writeln!(w, "{}", clip.name)?;
    }
    Ok(clips)
}

pub async fn get_channel_clip(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    clip_id: &str,
) -> GcpResult<Clip> {
    let path = format!(
        "{}/{}/clips/{}",
        V1,
        channel_name(project, location, channel_id),
        clip_id
    );
    let clip: Clip = client.get(SERVICE, &path, &[]).await.context("GetClip")?;
    writeln!(w, "Channel clip: {}", clip.name)?;
    Ok(clip)
}

pub async fn delete_channel_clip(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    channel_id: &str,
    clip_id: &str,
) -> GcpResult<()> {
    let name = format!(
        "{}/clips/{}",
        channel_name(project, location, channel_id),
        clip_id
    );
    delete_resource(client, &name, "DeleteClip").await?;
    writeln!(w, "Deleted channel clip")?;
    Ok(())
}

// ── Assets ──────────────────────────────────────────────────────────────

/// Register a video asset from a `gs://` URI (usable as a slate).
pub async fn create_asset(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    asset_id: &str,
    asset_uri: &str,
) -> GcpResult<Asset> {
    let path = format!("{}/{}/assets", V1, parent(project, location));
    let body = Asset {
        video: Some(VideoAsset {
            uri: asset_uri.to_string(),
        }),
        ..Default::default()
    };
    let op: Operation = client
        .post_with_query(SERVICE, &path, &[("assetId", asset_id)], &body)
        .await
        .context("CreateAsset")?;
    let asset: Asset = finish(client, op).await?;
    writeln!(w, "Asset: {}", asset.name)?;
    Ok(asset)
}

pub async fn list_assets(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<Asset>> {
    let path = format!("{}/{}/assets", V1, parent(project, location));
    let assets = client
        .get_all_pages(SERVICE, &path, &[], |p: ListPage| (p.assets, p.next_page_token))
        .await
        .context("ListAssets")?;
    writeln!(w, "Assets:")?;
    for asset in &assets {
        writeln!(w, "{}", asset.name)?;
    }
    Ok(assets)
}

pub async fn get_asset(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    asset_id: &str,
) -> GcpResult<Asset> {
    let path = format!("{}/{}/assets/{}", V1, parent(project, location), asset_id);
    let asset: Asset = client.get(SERVICE, &path, &[]).await.context("GetAsset")?;
    writeln!(w, "Asset: {}", asset.name)?;
    Ok(asset)
}

pub async fn delete_asset(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    asset_id: &str,
) -> GcpResult<()> {
    let name = format!("{}/assets/{}", parent(project, location), asset_id);
    delete_resource(client, &name, "DeleteAsset").await?;
    writeln!(w, "Deleted asset")?;
    Ok(())
}

// ── Pools ───────────────────────────────────────────────────────────────

pub async fn get_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    pool_id: &str,
) -> GcpResult<Pool> {
    let path = format!("{}/{}/pools/{}", V1, parent(project, location), pool_id);
    let pool: Pool = client.get(SERVICE, &path, &[]).await.context("GetPool")?;
    writeln!(w, "Pool: {}", pool.name)?;
    Ok(pool)
}

/// Peer the pool with a VPC network, e.g. `projects/123/global/networks/default`.
/// An empty `peered_network` removes the peering.
pub async fn update_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    pool_id: &str,
    peered_network: &str,
) -> GcpResult<Pool> {
    let path = format!("{}/{}/pools/{}", V1, parent(project, location), pool_id);
    let body = Pool {
        network_config: Some(NetworkConfig {
            peered_network: peered_network.to_string(),
        }),
        ..Default::default()
    };
    let op: Operation = client
        .patch(SERVICE, &path, &body, &[("updateMask", "networkConfig")])
        .await
        .context("UpdatePool")?;
    let pool: Pool = finish(client, op).await?;
    writeln!(w, "Updated pool: {}", pool.name)?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_body_matches_ladder() {
        let body = serde_json::to_value(channel_body(vec![], "gs://b/out/")).unwrap();
        assert_eq!(body["output"]["uri"], "gs://b/out/");
        assert_eq!(body["elementaryStreams"][0]["videoStream"]["h264"]["bitrateBps"], 3000000);
        assert_eq!(body["elementaryStreams"][1]["audioStream"]["bitrateBps"], 160000);
        assert_eq!(body["muxStreams"][1]["segmentSettings"]["segmentDuration"], "2s");
        assert_eq!(body["manifests"][0]["maxSegmentCount"], 5);
        assert_eq!(body["retentionConfig"]["retentionWindowDuration"], "86400s");
        assert!(body.get("inputAttachments").is_none());
    }

    #[test]
    fn failover_attachment_shape() {
        let a = InputAttachment {
            key: "my-primary-input".into(),
            input: input_name("p", "us-central1", "in"),
            automatic_failover: Some(AutomaticFailover {
                input_keys: vec!["my-backup-input".into()],
            }),
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["input"], "projects/p/locations/us-central1/inputs/in");
        assert_eq!(v["automaticFailover"]["inputKeys"][0], "my-backup-input");
    }
}
