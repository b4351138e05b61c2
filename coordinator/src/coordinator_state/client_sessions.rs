use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

/// Clients that pinged recently.
#[derive(Debug, Default)]
pub struct ClientSessions {
    last_seen: BTreeMap<String, Instant>,
}

impl ClientSessions {
    pub fn ping(&mut self, client_id: &str, now: Instant) {
        self.last_seen.insert(client_id.to_owned(), now);
    }
    /// Drops the sessions silent for longer than `timeout`, returns their ids.
    pub fn sweep(&mut self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut expired = vec![];
        self.last_seen.retain(|client_id, last_seen| {
            let alive = now.saturating_duration_since(*last_seen) <= timeout;
            if !alive {
                expired.push(client_id.clone());
            }
            alive
        });
        expired
    }
    pub fn clients(&self) -> Vec<String> {
        self.last_seen.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_clients_are_dropped() {
        let start = Instant::now();
        let mut sessions = ClientSessions::default();
        sessions.ping("client-a", start);
        sessions.ping("client-b", start + Duration::from_secs(30));

        let expired = sessions.sweep(start + Duration::from_secs(61), Duration::from_secs(60));
        assert_eq!(expired, vec!["client-a"]);
        assert_eq!(sessions.clients(), vec!["client-b"]);
    }
}
