//! The process-wide voice session slot.
//!
//! Exactly one slot exists, owned by [`crate::BotContext`]; every transition goes
//! through the methods below so the `absent -> connecting -> active` ordering
//! holds.

use tracing::{debug, warn};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};

use crate::models::Session;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Absent,
    Connecting {
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
    },
    Active(Session),
}

#[derive(Debug, Default)]
pub struct SessionSlot {
    state: SessionState,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True only once the platform confirmed the connection.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.state, SessionState::Absent)
    }

    pub fn active(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Active(s) => Some(s),
            _ => None,
        }
    }

    /// Guild of whatever is recorded, connecting or active.
    pub fn guild_id(&self) -> Option<Id<GuildMarker>> {
        match &self.state {
            SessionState::Absent => None,
            SessionState::Connecting { guild_id, .. } => Some(*guild_id),
            SessionState::Active(s) => Some(s.guild_id),
        }
    }

    pub fn begin_connect(&mut self, guild_id: Id<GuildMarker>, channel_id: Id<ChannelMarker>) {
        if !self.is_absent() {
            warn!("SessionSlot: begin_connect over a recorded session => replacing {:?}", self.state);
        }
        self.state = SessionState::Connecting { guild_id, channel_id };
    }

    /// Promotes a pending connection. Returns false (and leaves the slot alone)
    /// if the slot no longer holds the matching `Connecting` entry.
    pub fn activate(&mut self, session: Session) -> bool {
        match &self.state {
            SessionState::Connecting { guild_id, channel_id }
                if *guild_id == session.guild_id && *channel_id == session.channel_id =>
            {
                self.state = SessionState::Active(session);
                true
            }
            other => {
                debug!("SessionSlot: activate ignored, slot is {:?}", other);
                false
            }
        }
    }

    /// Empties the slot, handing back whatever was there.
    pub fn clear(&mut self) -> SessionState {
        std::mem::take(&mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(channel: u64) -> Session {
        Session {
            guild_id: Id::new(1),
            channel_id: Id::new(channel),
            channel_name: format!("vc-{channel}"),
        }
    }

    #[test]
    fn starts_absent() {
        let slot = SessionSlot::new();
        assert!(slot.is_absent());
        assert!(!slot.is_active());
        assert_eq!(slot.guild_id(), None);
    }

    #[test]
    fn connect_then_activate() {
        let mut slot = SessionSlot::new();
        slot.begin_connect(Id::new(1), Id::new(10));
        assert!(!slot.is_active());
        assert_eq!(slot.guild_id(), Some(Id::new(1)));

        assert!(slot.activate(session(10)));
        assert_eq!(slot.active(), Some(&session(10)));
    }

    #[test]
    fn activate_requires_matching_connect() {
        let mut slot = SessionSlot::new();
        assert!(!slot.activate(session(10)));
        assert!(slot.is_absent());

        slot.begin_connect(Id::new(1), Id::new(11));
        assert!(!slot.activate(session(10)));
        assert!(matches!(slot.state(), SessionState::Connecting { .. }));
    }

    #[test]
    fn clear_returns_previous_state() {
        let mut slot = SessionSlot::new();
        slot.begin_connect(Id::new(1), Id::new(10));
        slot.activate(session(10));

        let prev = slot.clear();
        assert_eq!(prev, SessionState::Active(session(10)));
        assert!(slot.is_absent());
        assert_eq!(slot.clear(), SessionState::Absent);
    }
}
