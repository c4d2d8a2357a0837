//! JSON representation of host-to-host intents.
//!
//! Decoding rebuilds the intent through its builder, so the not-optical
//! default is re-applied and the key is derived from the decoded hosts and
//! selector.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constraint::Constraint;
use crate::error::{MeridianError, Result};
use crate::flow::{TrafficSelector, TrafficTreatment};
use crate::intent::{ApplicationId, HostToHostIntent, ResourceGroup};
use crate::types::HostId;

/// Wire shape of a [`HostToHostIntent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostToHostIntentJson {
    pub one: Option<HostId>,
    pub two: Option<HostId>,
    pub app_id: Option<ApplicationId>,
    /// Informational on decode; the key is always re-derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub selector: TrafficSelector,
    #[serde(default)]
    pub treatment: TrafficTreatment,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<ResourceGroup>,
}

/// Encode an intent.
pub fn encode(intent: &HostToHostIntent) -> Result<Value> {
    let json = HostToHostIntentJson {
        one: Some(intent.one().clone()),
        two: Some(intent.two().clone()),
        app_id: Some(intent.app_id().clone()),
        key: Some(intent.key().value.clone()),
        selector: intent.selector().clone(),
        treatment: intent.treatment().clone(),
        constraints: intent.constraints().to_vec(),
        priority: Some(intent.priority()),
        resource_group: intent.resource_group(),
    };
    Ok(serde_json::to_value(json)?)
}

/// Decode an intent, requiring the `one`, `two` and `app_id` members.
pub fn decode(value: &Value) -> Result<HostToHostIntent> {
    let json: HostToHostIntentJson = serde_json::from_value(value.clone())?;
    from_json(json)
}

/// Build an intent from its already-parsed wire shape.
pub fn from_json(json: HostToHostIntentJson) -> Result<HostToHostIntent> {
    let missing = |member: &str| MeridianError::IntentInvalid {
        key: json.key.clone(),
        message: format!("{member} member is required"),
    };
    let one = json.one.clone().ok_or_else(|| missing("one"))?;
    let two = json.two.clone().ok_or_else(|| missing("two"))?;
    let app_id = json.app_id.clone().ok_or_else(|| missing("app_id"))?;

    let key = HostToHostIntent::create_key(&one, &two, &json.selector, &app_id);
    let mut builder = HostToHostIntent::builder()
        .app_id(app_id)
        .key(key)
        .one(one)
        .two(two)
        .selector(json.selector)
        .treatment(json.treatment)
        .constraints(json.constraints);
    if let Some(priority) = json.priority {
        builder = builder.priority(priority);
    }
    if let Some(group) = json.resource_group {
        builder = builder.resource_group(group);
    }
    builder.build()
}
