//! Host-side callables the STB login page invokes through the bridge,
//! and the session-scoped context they read and write.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use telegate_auth::Authenticator;
use tracing::debug;

use crate::bridge::{CallableRegistry, HandlerError};
use crate::channel::{parse_channel, Channel};
use crate::config::Config;
use crate::engine::Tab;
use crate::session::Extractor;
use crate::Result;

/// Context key holding the captured channel list.
pub const CHANNEL_KEY: &str = "Channel";

/// Key→JSON map shared between the bridge callables and the session.
/// Fresh per session; never outlives it.
#[derive(Clone, Default)]
pub struct SessionContext {
    data: Arc<Mutex<Map<String, Value>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key; missing keys read as the empty string, which is what
    /// the vendor flow expects from an unset config slot.
    pub fn get(&self, key: &str) -> Value {
        self.lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    pub fn set(&self, key: &str, value: Value) {
        self.lock().insert(key.to_string(), value);
    }

    /// Append a channel to the channel list.
    pub fn push_channel(&self, channel: &Channel) -> std::result::Result<(), HandlerError> {
        let value = serde_json::to_value(channel)
            .map_err(|e| HandlerError::new(format!("channel not serializable: {e}")))?;
        let mut data = self.lock();
        match data
            .entry(CHANNEL_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(list) => {
                list.push(value);
                Ok(())
            }
            other => Err(HandlerError::new(format!(
                "context key '{CHANNEL_KEY}' holds {other:?}, expected a list"
            ))),
        }
    }

    /// Sort the captured channel list by the subscriber channel number.
    pub fn sort_channels(&self) {
        if let Some(Value::Array(list)) = self.lock().get_mut(CHANNEL_KEY) {
            list.sort_by_key(|c| c.get("UserChannelID").and_then(Value::as_i64).unwrap_or(0));
        }
    }

    pub fn channel_count(&self) -> usize {
        match self.lock().get(CHANNEL_KEY) {
            Some(Value::Array(list)) => list.len(),
            _ => 0,
        }
    }

    /// Copy of the whole context as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.lock().clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        // Handlers never panic while holding the lock, so poisoning is
        // unrecoverable programmer error territory.
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Register the callables the carrier's login page expects from the box
/// firmware. `CTCSetConfig` mutates the shared context and is serialized;
/// the rest run concurrently.
pub fn register_stb_callables(
    registry: &mut CallableRegistry,
    config: &Config,
    context: &SessionContext,
) -> Result<()> {
    let credential_cfg = config.credential.clone();
    let auth_cfg = config.auth.clone();
    registry.register(
        "Authentication.CTCGetAuthInfo",
        &["token"],
        move |args, kwargs| {
            let token = expect_string(&args, &kwargs, 0, "token")?;
            let credential = credential_cfg
                .to_credential()
                .map_err(to_handler_error)?
                .with_token(&token)
                .map_err(to_handler_error)?;
            let authenticator =
                Authenticator::new(credential, auth_cfg.method, auth_cfg.salt.clone())
                    .map_err(to_handler_error)?;
            let info = authenticator.auth_info().map_err(to_handler_error)?;
            Ok(Value::String(info))
        },
    )?;

    let ctx = context.clone();
    registry.register("Authentication.CTCGetConfig", &["key"], move |args, kwargs| {
        let key = expect_string(&args, &kwargs, 0, "key")?;
        Ok(ctx.get(&key))
    })?;

    let ctx = context.clone();
    registry.register_serialized(
        "Authentication.CTCSetConfig",
        &["key", "value"],
        move |args, kwargs| {
            let key = expect_string(&args, &kwargs, 0, "key")?;
            let value = expect_value(&args, &kwargs, 1, "value")?;
            if key == CHANNEL_KEY {
                let content = value.as_str().ok_or_else(|| {
                    HandlerError::new("Channel value must be a string")
                })?;
                let channel = parse_channel(content).map_err(to_handler_error)?;
                ctx.push_channel(&channel)?;
                debug!(count = ctx.channel_count(), "channel captured");
            } else {
                ctx.set(&key, value);
            }
            Ok(Value::Null)
        },
    )?;

    registry.register("Authentication.CTCStartUpdate", &[], |_args, _kwargs| {
        debug!("update requested by login page");
        Ok(Value::Null)
    })?;

    Ok(())
}

/// Default extraction step: order the channel list and hand back the whole
/// session context.
pub struct ChannelListExtractor;

#[async_trait]
impl Extractor for ChannelListExtractor {
    async fn extract(&self, _tab: &mut dyn Tab, context: &SessionContext) -> Result<Value> {
        context.sort_channels();
        Ok(context.snapshot())
    }
}

fn expect_value(
    args: &[Value],
    kwargs: &Map<String, Value>,
    index: usize,
    name: &str,
) -> std::result::Result<Value, HandlerError> {
    kwargs
        .get(name)
        .or_else(|| args.get(index))
        .cloned()
        .ok_or_else(|| HandlerError::new(format!("missing argument '{name}'")))
}

fn expect_string(
    args: &[Value],
    kwargs: &Map<String, Value>,
    index: usize,
    name: &str,
) -> std::result::Result<String, HandlerError> {
    let value = expect_value(args, kwargs, index, name)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| HandlerError::new(format!("argument '{name}' must be a string")))
}

fn to_handler_error(e: impl std::fmt::Display) -> HandlerError {
    HandlerError::new(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use telegate_auth::{reverse, AuthMethod};

    fn config() -> Config {
        Config::parse(
            r#"
browser:
  start_url: "http://epg.example/login?token=${token}"
  end_url: "**/finish.html"
auth:
  method: SALTED_MD5
  salt: "01234567"
credential:
  user_id: "user01"
  password: "secret"
  ip: "192.168.1.10"
  mac: "00:1A:2B:3C:4D:5E"
  product_id: "product9"
"#,
        )
        .unwrap()
    }

    fn registry_with_context() -> (CallableRegistry, SessionContext) {
        let mut registry = CallableRegistry::new();
        let context = SessionContext::new();
        register_stb_callables(&mut registry, &config(), &context).unwrap();
        (registry, context)
    }

    fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn auth_info_decrypts_back_to_credential() {
        let (registry, _) = registry_with_context();
        let result = registry
            .get("Authentication.CTCGetAuthInfo")
            .unwrap()
            .invoke(Vec::new(), kwargs(&[("token", json!("sess-token"))]))
            .await
            .unwrap();
        let info = result.as_str().unwrap();
        let credential = reverse(
            "secret",
            info,
            AuthMethod::SaltedMd5,
            Some("01234567"),
        )
        .unwrap();
        assert_eq!(credential.user_id(), "user01");
        assert_eq!(credential.token(), Some("sess-token"));
    }

    #[tokio::test]
    async fn get_config_defaults_to_empty_string() {
        let (registry, context) = registry_with_context();
        let missing = registry
            .get("Authentication.CTCGetConfig")
            .unwrap()
            .invoke(Vec::new(), kwargs(&[("key", json!("Unset"))]))
            .await
            .unwrap();
        assert_eq!(missing, json!(""));

        context.set("Greeting", json!("hello"));
        let present = registry
            .get("Authentication.CTCGetConfig")
            .unwrap()
            .invoke(Vec::new(), kwargs(&[("key", json!("Greeting"))]))
            .await
            .unwrap();
        assert_eq!(present, json!("hello"));
    }

    #[tokio::test]
    async fn set_config_captures_channels() {
        let (registry, context) = registry_with_context();
        let channel = r#"ChannelID="7",ChannelName="Movies",UserChannelID=2,ChannelURL="igmp://239.1.1.1",TimeShift=0,ChannelSDP="sdp://x",PositionX=0,PositionY=0,BeginTime=0,Interval=0,Lasting=0,ChannelType=1"#;
        registry
            .get("Authentication.CTCSetConfig")
            .unwrap()
            .invoke(
                Vec::new(),
                kwargs(&[("key", json!("Channel")), ("value", json!(channel))]),
            )
            .await
            .unwrap();
        assert_eq!(context.channel_count(), 1);
    }

    #[tokio::test]
    async fn set_config_stores_plain_values() {
        let (registry, context) = registry_with_context();
        registry
            .get("Authentication.CTCSetConfig")
            .unwrap()
            .invoke(
                Vec::new(),
                kwargs(&[("key", json!("EPGDomain")), ("value", json!("epg.example"))]),
            )
            .await
            .unwrap();
        assert_eq!(context.get("EPGDomain"), json!("epg.example"));
    }

    #[tokio::test]
    async fn bad_channel_string_is_a_handler_failure() {
        let (registry, context) = registry_with_context();
        let err = registry
            .get("Authentication.CTCSetConfig")
            .unwrap()
            .invoke(
                Vec::new(),
                kwargs(&[("key", json!("Channel")), ("value", json!("garbage"))]),
            )
            .await
            .unwrap_err();
        assert!(!err.to_string().is_empty());
        assert_eq!(context.channel_count(), 0);
    }

    #[test]
    fn sort_orders_by_user_channel_id() {
        let context = SessionContext::new();
        for (id, user_id) in [("b", 9), ("a", 1), ("c", 4)] {
            let channel = parse_channel(&format!(
                r#"ChannelID="{id}",ChannelName="{id}",UserChannelID={user_id},ChannelURL="u",TimeShift=0,ChannelSDP="s",PositionX=0,PositionY=0,BeginTime=0,Interval=0,Lasting=0,ChannelType=1"#
            ))
            .unwrap();
            context.push_channel(&channel).unwrap();
        }
        context.sort_channels();
        let snapshot = context.snapshot();
        let ids: Vec<i64> = snapshot["Channel"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["UserChannelID"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [1, 4, 9]);
    }

    #[tokio::test]
    async fn positional_args_are_accepted() {
        let (registry, _) = registry_with_context();
        let result = registry
            .get("Authentication.CTCGetConfig")
            .unwrap()
            .invoke(vec![json!("Anything")], Map::new())
            .await
            .unwrap();
        assert_eq!(result, json!(""));
    }
}
