use fifu_kernel::message::MetaMessage;
use fifu_kernel::plugin::{PluginContext, PluginResult, ProtocolPlugin};
use fifu_kernel::uri::Uri;
use fifu_runtime::GatewayBuilder;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A mock protocol plugin.
///
/// It mints foreign names by swapping the scheme, records every mapping
/// request and every message handed to it, and can push messages into the
/// gateway as if they had been received. Clones share state, so a test can
/// keep one handle while the gateway owns another.
#[derive(Clone)]
pub struct MockProtocol {
    scheme: String,
    context: Arc<RwLock<Option<PluginContext>>>,
    declines: Arc<AtomicBool>,
    mint_delay: Arc<RwLock<Duration>>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    /// Originals passed to `install_mapping`, in call order
    pub mint_history: Arc<RwLock<Vec<Uri>>>,
    /// Messages passed to `send_message`, in call order
    pub sent_history: Arc<RwLock<Vec<MetaMessage>>>,
}

impl MockProtocol {
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            context: Arc::new(RwLock::new(None)),
            declines: Arc::new(AtomicBool::new(false)),
            mint_delay: Arc::new(RwLock::new(Duration::ZERO)),
            started: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            mint_history: Arc::new(RwLock::new(Vec::new())),
            sent_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register this mock with a gateway builder, capturing the gateway's
    /// plugin context so that [`inject`](Self::inject) works.
    pub fn attach_to(&self, builder: GatewayBuilder) -> GatewayBuilder {
        let mock = self.clone();
        builder.protocol_with(move |context| {
            *mock.context.write() = Some(context.clone());
            Arc::new(mock) as Arc<dyn ProtocolPlugin>
        })
    }

    /// Decline (or stop declining) every mapping request.
    pub fn set_declines(&self, declines: bool) {
        self.declines.store(declines, Ordering::SeqCst);
    }

    /// Sleep this long inside `install_mapping`, to widen race windows.
    pub fn set_mint_delay(&self, delay: Duration) {
        *self.mint_delay.write() = delay;
    }

    /// Push a message into the gateway as if this plugin had received it.
    ///
    /// # Panics
    ///
    /// If the mock was not registered through [`attach_to`](Self::attach_to).
    pub fn inject(&self, message: MetaMessage) {
        let context = self.context.read();
        let context = context
            .as_ref()
            .expect("MockProtocol::inject needs attach_to first");
        context.inbound.push(message);
    }

    /// Messages the router sent through this plugin
    pub fn sent(&self) -> Vec<MetaMessage> {
        self.sent_history.read().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent_history.read().len()
    }

    /// Number of times the router asked this plugin for a mapping
    pub fn mint_count(&self) -> usize {
        self.mint_history.read().len()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl ProtocolPlugin for MockProtocol {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn start(&self) -> PluginResult<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn install_mapping(&self, original: &Uri) -> Uri {
        self.mint_history.write().push(original.clone());
        let delay = *self.mint_delay.read();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.declines.load(Ordering::SeqCst) {
            return Uri::invalid();
        }
        original.with_scheme(self.scheme.clone())
    }

    fn send_message(&self, message: MetaMessage) {
        self.sent_history.write().push(message);
    }
}

#[macro_export]
macro_rules! assert_sent {
    ($protocol:expr, $expected_count:expr) => {
        let count = $protocol.send_count();
        assert_eq!(
            count, $expected_count,
            "Expected protocol '{}' to send {} messages, but it sent {}",
            stringify!($protocol),
            $expected_count,
            count
        );
    };
}
