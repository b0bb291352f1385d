use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use log::info;

use crate::{config_error, core::RuntimeResult};

use super::bus::Channel;

/// Table of live channels keyed by URI
#[derive(Default)]
pub struct ChannelManager {
    channels: DashMap<String, Arc<Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel: Arc<Channel>) -> RuntimeResult<()> {
        match self.channels.entry(channel.uri().to_string()) {
            Entry::Occupied(_) => Err(config_error!(
                "Channel already registered: {}",
                channel.uri()
            )),
            Entry::Vacant(entry) => {
                info!("Registered channel {}", channel.uri());
                entry.insert(channel);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, uri: &str) -> Option<Arc<Channel>> {
        let removed = self.channels.remove(uri).map(|(_, channel)| channel);
        if removed.is_some() {
            info!("Unregistered channel {}", uri);
        }
        removed
    }

    pub fn get(&self, uri: &str) -> Option<Arc<Channel>> {
        self.channels.get(uri).map(|c| c.value().clone())
    }

    pub fn channel_uris(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
