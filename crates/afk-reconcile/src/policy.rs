//! Resolved engine policy: channel ids instead of names, plus the
//! time-of-day threshold resolver.

use std::collections::{BTreeMap, BTreeSet};

use afk_config::AfkConfig;
use afk_policy::{MuteThresholds, PolicyResolver};
use afk_schemas::{ChannelId, ChannelRecord};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::{ClientRecord, Connector, ReconcileError};

#[derive(Clone, Debug, PartialEq)]
pub struct Policy {
    pub holding_channel: ChannelId,
    /// Always contains the holding channel and every override channel.
    pub exempt_channels: BTreeSet<ChannelId>,
    /// Parent whose children are candidate restore destinations.
    pub sibling_group: ChannelId,
    /// Lower-cased display name -> parking channel replacing the holding channel.
    pub overrides: BTreeMap<String, ChannelId>,
    pub resolver: PolicyResolver,
}

impl Policy {
    pub fn new(
        holding_channel: ChannelId,
        exempt_channels: impl IntoIterator<Item = ChannelId>,
        sibling_group: ChannelId,
        resolver: PolicyResolver,
    ) -> Self {
        let mut exempt: BTreeSet<ChannelId> = exempt_channels.into_iter().collect();
        exempt.insert(holding_channel);
        Self {
            holding_channel,
            exempt_channels: exempt,
            sibling_group,
            overrides: BTreeMap::new(),
            resolver,
        }
    }

    /// Park the client named `display_name` in `channel` instead of the
    /// holding channel. The override channel becomes exempt.
    pub fn with_override(mut self, display_name: &str, channel: ChannelId) -> Self {
        self.overrides.insert(display_name.to_lowercase(), channel);
        self.exempt_channels.insert(channel);
        self
    }

    /// Resolve configured channel names against the server.
    ///
    /// The holding channel and every exempt channel must resolve, and every
    /// override channel id must exist; a mover without a valid parking
    /// destination must not start.
    pub fn resolve<C: Connector + ?Sized>(
        connector: &C,
        cfg: &AfkConfig,
    ) -> Result<Self, ReconcileError> {
        let resolver = cfg
            .policy_resolver()
            .map_err(|e| ReconcileError::ConfigurationInvalid(format!("{e:#}")))?;

        let holding = resolve_channel(connector, &cfg.holding_channel)?;
        let mut exempt = Vec::with_capacity(cfg.exempt_channels.len());
        for name in &cfg.exempt_channels {
            exempt.push(resolve_channel(connector, name)?);
        }

        let mut policy = Policy::new(holding, exempt, cfg.sibling_group_parent, resolver);
        for (name, channel) in cfg.normalized_overrides() {
            check_override_channel(connector, &name, channel)?;
            policy = policy.with_override(&name, channel);
        }

        info!(
            holding_channel = %policy.holding_channel,
            exempt = policy.exempt_channels.len(),
            sibling_group = %policy.sibling_group,
            "afk policy resolved"
        );
        Ok(policy)
    }

    pub fn is_exempt(&self, channel: ChannelId) -> bool {
        self.exempt_channels.contains(&channel)
    }

    /// Where this client goes when it is classified away.
    pub fn parking_channel(&self, client: &ClientRecord) -> ChannelId {
        self.overrides
            .get(&client.display_name.to_lowercase())
            .copied()
            .unwrap_or(self.holding_channel)
    }

    pub fn threshold_for(&self, now: DateTime<Utc>) -> Duration {
        self.resolver.threshold_for(now)
    }

    pub fn set_thresholds(&mut self, thresholds: MuteThresholds) {
        self.resolver.thresholds = thresholds;
    }
}

fn resolve_channel<C: Connector + ?Sized>(
    connector: &C,
    name: &str,
) -> Result<ChannelId, ReconcileError> {
    let matches = connector
        .find_channel(name)
        .map_err(|e| ReconcileError::ChannelResolutionFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    pick_channel(name, &matches).ok_or_else(|| ReconcileError::ChannelResolutionFailed {
        name: name.to_string(),
        reason: "no matching channel".to_string(),
    })
}

fn check_override_channel<C: Connector + ?Sized>(
    connector: &C,
    display_name: &str,
    channel: ChannelId,
) -> Result<(), ReconcileError> {
    let failed = |reason: String| ReconcileError::ChannelResolutionFailed {
        name: format!("override for {display_name} ({channel})"),
        reason,
    };
    match connector.channel_exists(channel) {
        Ok(true) => Ok(()),
        Ok(false) => Err(failed("no such channel id".to_string())),
        Err(e) => Err(failed(e.to_string())),
    }
}

/// `find_channel` matches substrings; prefer an exact name, else the first hit.
fn pick_channel(name: &str, matches: &[ChannelRecord]) -> Option<ChannelId> {
    matches
        .iter()
        .find(|c| c.name == name)
        .or_else(|| matches.first())
        .map(|c| c.id)
}
