//! # Radio Link Module
//!
//! Seam between the receive pipeline and the link-layer service.
//!
//! This module handles:
//! - Sender hardware addresses
//! - The receive handler signature invoked from the radio's context
//! - Bringing the radio up (initialize, then register the handler)
//! - A serial-attached radio dongle implementation

pub mod serial;
pub mod slip;

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::error::RadioError;

/// Length of a sender hardware address
pub const MAC_ADDRESS_LEN: usize = 6;

/// 6-byte hardware identifier of a sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; MAC_ADDRESS_LEN]);

impl MacAddress {
    /// Build an address from the first 6 bytes of `bytes`
    ///
    /// Returns `None` if fewer than 6 bytes are available.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; MAC_ADDRESS_LEN] = bytes.get(..MAC_ADDRESS_LEN)?.try_into().ok()?;
        Some(Self(octets))
    }
}

/// Six uppercase hex byte pairs, no separators
impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for octet in &self.0 {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

/// Callback invoked by the radio for every received packet
///
/// Runs in the radio's own context, so implementations must not block. The
/// radio calls it from one context at a time.
pub type ReceiveHandler = Arc<dyn Fn(MacAddress, &[u8]) + Send + Sync>;

/// Link-layer radio service
pub trait RadioLink {
    /// Start the radio subsystem
    fn initialize(&mut self) -> Result<(), RadioError>;

    /// Register the callback for inbound packets
    ///
    /// Only valid after a successful [`RadioLink::initialize`].
    fn register_receive_handler(&mut self, handler: ReceiveHandler) -> Result<(), RadioError>;

    /// Human-readable identification of the link, for logs
    fn description(&self) -> String;

    /// Hardware address of this receiver, which transmitters address
    ///
    /// `None` when the link cannot report it.
    fn local_address(&self) -> Option<MacAddress>;
}

/// Initialize `radio` and attach `handler`
///
/// A failure is reported once and `false` is returned. The caller keeps
/// running in a degraded listening state with no frames arriving.
pub fn bring_up<R: RadioLink + ?Sized>(radio: &mut R, handler: ReceiveHandler) -> bool {
    info!("Initializing radio link ({})", radio.description());

    if let Err(e) = radio.initialize() {
        error!("Error initializing radio: {}; continuing in degraded listening mode", e);
        return false;
    }

    if let Err(e) = radio.register_receive_handler(handler) {
        error!("Error registering receive handler: {}; continuing in degraded listening mode", e);
        return false;
    }

    info!("Radio link initialized successfully");
    true
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory radio that lets tests inject packets
    #[derive(Clone, Default)]
    pub struct MockRadio {
        pub handler: Arc<Mutex<Option<ReceiveHandler>>>,
        pub init_error: Option<String>,
        pub initialized: bool,
        pub address: Option<MacAddress>,
    }

    impl MockRadio {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(reason: &str) -> Self {
            Self {
                init_error: Some(reason.to_string()),
                ..Self::default()
            }
        }

        pub fn with_address(address: MacAddress) -> Self {
            Self {
                address: Some(address),
                ..Self::default()
            }
        }

        /// Deliver a packet as the hardware would. Returns false if no
        /// handler is registered.
        pub fn inject(&self, sender: MacAddress, data: &[u8]) -> bool {
            let handler = self.handler.lock().unwrap().clone();
            match handler {
                Some(handler) => {
                    handler(sender, data);
                    true
                }
                None => false,
            }
        }
    }

    impl RadioLink for MockRadio {
        fn initialize(&mut self) -> Result<(), RadioError> {
            if let Some(reason) = &self.init_error {
                return Err(RadioError::InitFailed(reason.clone()));
            }
            self.initialized = true;
            Ok(())
        }

        fn register_receive_handler(&mut self, handler: ReceiveHandler) -> Result<(), RadioError> {
            if !self.initialized {
                return Err(RadioError::NotInitialized);
            }
            *self.handler.lock().unwrap() = Some(handler);
            Ok(())
        }

        fn description(&self) -> String {
            "mock radio".to_string()
        }

        fn local_address(&self) -> Option<MacAddress> {
            self.address
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockRadio;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_mac_address_display_is_uppercase_without_separators() {
        let mac = MacAddress([0xa1, 0xb2, 0xc3, 0x04, 0x0e, 0xff]);
        assert_eq!(mac.to_string(), "A1B2C3040EFF");
    }

    #[test]
    fn test_mac_address_from_slice() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(MacAddress::from_slice(&bytes), Some(MacAddress([1, 2, 3, 4, 5, 6])));
        assert_eq!(MacAddress::from_slice(&bytes[..5]), None);
    }

    #[test]
    fn test_bring_up_registers_handler() {
        let mut radio = MockRadio::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler: ReceiveHandler = Arc::new(move |_: MacAddress, _: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bring_up(&mut radio, handler));
        assert!(radio.inject(MacAddress::default(), &[1, 2, 3]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bring_up_init_failure_is_degraded_not_fatal() {
        let mut radio = MockRadio::failing("radio refused to start");
        let handler: ReceiveHandler = Arc::new(|_: MacAddress, _: &[u8]| {});

        assert!(!bring_up(&mut radio, handler));
        // No handler attached: packets go nowhere
        assert!(!radio.inject(MacAddress::default(), &[1]));
    }

    #[test]
    fn test_register_before_initialize_is_rejected() {
        let mut radio = MockRadio::new();
        let result = radio.register_receive_handler(Arc::new(|_: MacAddress, _: &[u8]| {}));
        assert!(matches!(result, Err(RadioError::NotInitialized)));
    }
}
