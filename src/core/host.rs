//! Collaborators the core calls into but never implements.
//!
//! Every call is fire-and-forget: the core does not await or inspect results.

use super::menu::ExternalRef;
use super::profile::Profile;

pub trait Host {
    fn launch(&mut self, target: &ExternalRef);
    fn open_external_url(&mut self, url: &str);
    fn shutdown(&mut self);
    fn reboot(&mut self);
    fn minimize_host_window(&mut self);
    fn persist_profile(&mut self, profile: &Profile);
    /// A profile was deleted from the roster.
    fn remove_profile(&mut self, _profile_id: &str) {}
    /// Short rumble on the pad that produced an action.
    fn haptic_pulse(&mut self) {}
}

/// A host that drops every request. Useful before the real one is wired.
#[derive(Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn launch(&mut self, _target: &ExternalRef) {}
    fn open_external_url(&mut self, _url: &str) {}
    fn shutdown(&mut self) {}
    fn reboot(&mut self) {}
    fn minimize_host_window(&mut self) {}
    fn persist_profile(&mut self, _profile: &Profile) {}
}
