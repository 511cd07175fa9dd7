use crate::controller::{PeerEvent, PeerSession, PeerState, TimerKey};
use tandem_core::{ErrorKind, IceConnectivity};
use tracing::info;

impl PeerSession {
    pub(super) async fn on_connectivity(&mut self, connectivity: IceConnectivity) {
        self.emit(PeerEvent::ConnectivityChanged(connectivity));

        match connectivity {
            established if established.is_established() => {
                self.on_established();
            }

            IceConnectivity::Checking => {
                if !self.timers.is_armed(&TimerKey::CheckingTimeout) {
                    self.timers.arm(
                        TimerKey::CheckingTimeout,
                        self.config.checking_timeout,
                        self.epoch,
                    );
                }
            }

            IceConnectivity::Disconnected => {
                if !self.timers.is_armed(&TimerKey::DisconnectGrace) {
                    self.timers.arm(
                        TimerKey::DisconnectGrace,
                        self.config.disconnected_grace,
                        self.epoch,
                    );
                }
            }

            IceConnectivity::Failed => {
                self.handle_failure(ErrorKind::Connectivity, "ICE failed".to_owned())
                    .await;
            }

            IceConnectivity::New
            | IceConnectivity::Connected
            | IceConnectivity::Completed
            | IceConnectivity::Closed => {}
        }
    }

    fn on_established(&mut self) {
        self.timers.cancel(&TimerKey::CheckingTimeout);
        self.timers.cancel(&TimerKey::DisconnectGrace);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.recovering {
            info!("Connectivity came back before the retry");
            session.recovering = false;
            self.timers.cancel(&TimerKey::RetryBackoff);
        }
        if session.reconnect_attempts > 0 {
            info!(
                "Connected after {} attempts, resetting the counter",
                session.reconnect_attempts
            );
        }
        session.reconnect_attempts = 0;
        self.state = PeerState::Connected;
    }
}
