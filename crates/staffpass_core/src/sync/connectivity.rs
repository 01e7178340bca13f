//! Online/offline signal with advisory link quality.

use log::info;
use tokio::sync::watch;

/// Advisory link attributes; they never gate sync.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkQuality {
    /// Coarse link class such as `4g` or `wifi`.
    pub effective_type: String,
    pub downlink_mbps: f64,
    pub rtt_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Connectivity {
    pub online: bool,
    pub link: Option<LinkQuality>,
}

/// Publishes connectivity changes to any number of observers.
pub struct ConnectivityMonitor {
    sender: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(Connectivity { online, link: None });
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Connectivity {
        self.sender.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.sender.borrow().online
    }

    /// Records an online/offline transition. Repeating the current state
    /// does not wake observers.
    pub fn set_online(&self, online: bool) {
        let changed = self.sender.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            true
        });
        if changed {
            let status = if online { "online" } else { "offline" };
            info!("event=connectivity_change module=sync status={status}");
        }
    }

    /// Updates link attributes without touching the online flag.
    pub fn set_link(&self, link: Option<LinkQuality>) {
        self.sender.send_if_modified(|state| {
            if state.link == link {
                return false;
            }
            state.link = link;
            true
        });
    }
}
