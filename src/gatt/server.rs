use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::transport::{RequestId, Transport};

use super::*;

/// Per-service request handler. Defaults reject every operation, so a
/// handler only implements the requests its service supports.
pub trait ServiceHandler: Debug + Send + Sync {
    /// Returns the hosted service definition.
    fn service(&self) -> &Service;

    /// Called when the server starts. Handlers that push notifications
    /// spawn their schedule here.
    #[allow(unused_variables)]
    fn activate(self: Arc<Self>, transport: Arc<dyn Transport>) {}

    /// Called when the server stops or the service is unregistered.
    /// Returns the handle of any background task so the caller can await
    /// its completion.
    fn deactivate(&self) -> Option<JoinHandle<()>> {
        None
    }

    /// Handles a remote characteristic read.
    #[allow(unused_variables)]
    fn read_characteristic(&self, dev: &DeviceId, uuid: Uuid, offset: usize) -> Result<Vec<u8>> {
        Err(Error::NotSupported)
    }

    /// Handles a remote characteristic write.
    #[allow(unused_variables)]
    fn write_characteristic(&self, dev: &DeviceId, uuid: Uuid, value: &[u8]) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Handles a remote descriptor read.
    #[allow(unused_variables)]
    fn read_descriptor(
        &self,
        dev: &DeviceId,
        char_uuid: Uuid,
        desc_uuid: Uuid,
        offset: usize,
    ) -> Result<Vec<u8>> {
        Err(Error::NotSupported)
    }

    /// Handles a remote descriptor write.
    #[allow(unused_variables)]
    fn write_descriptor(
        &self,
        dev: &DeviceId,
        char_uuid: Uuid,
        desc_uuid: Uuid,
        value: &[u8],
    ) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Called on every connection state change.
    #[allow(unused_variables)]
    fn connection_changed(&self, dev: &DeviceId, connected: bool) {}
}

#[derive(Debug, Default)]
struct State {
    handlers: Vec<Arc<dyn ServiceHandler>>,
    started: bool,
}

/// GATT server routing transport requests to the handler of the service
/// that hosts the target attribute ([Vol 3] Part G, Section 2.5.2).
#[derive(Debug)]
pub struct Server {
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
}

impl Server {
    /// Creates a server with no registered services.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(State::default()),
        }
    }

    /// Registers a service handler. If the server is already started, the
    /// handler is activated immediately.
    ///
    /// # Panics
    ///
    /// Panics if a handler for the same service UUID is already
    /// registered.
    pub fn register_service(&self, handler: Arc<dyn ServiceHandler>) {
        let uuid = handler.service().uuid();
        let mut state = self.state.lock();
        assert!(
            !state.handlers.iter().any(|h| h.service().uuid() == uuid),
            "service {uuid} is already registered"
        );
        info!("Service added: {uuid}");
        if state.started {
            Arc::clone(&handler).activate(Arc::clone(&self.transport));
        }
        state.handlers.push(handler);
    }

    /// Unregisters a service handler and waits for its background task,
    /// if any, to finish. A no-op for an unknown UUID.
    pub async fn unregister_service(&self, uuid: Uuid) {
        let handler = {
            let mut state = self.state.lock();
            (state.handlers.iter())
                .position(|h| h.service().uuid() == uuid)
                .map(|i| state.handlers.remove(i))
        };
        if let Some(h) = handler {
            info!("Service removed: {uuid}");
            if let Some(task) = h.deactivate() {
                let _ = task.await;
            }
        }
    }

    /// Starts the server, activating all registered handlers. A no-op if
    /// already started.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if std::mem::replace(&mut state.started, true) {
            return;
        }
        info!("GATT server started");
        for h in &state.handlers {
            Arc::clone(h).activate(Arc::clone(&self.transport));
        }
    }

    /// Stops the server. When this returns, every handler has been
    /// deactivated and its background task has finished.
    pub async fn stop(&self) {
        let tasks = {
            let mut state = self.state.lock();
            if !std::mem::replace(&mut state.started, false) {
                return;
            }
            (state.handlers.iter())
                .filter_map(|h| h.deactivate())
                .collect::<Vec<_>>()
        };
        for task in tasks {
            let _ = task.await;
        }
        info!("GATT server stopped");
    }

    /// Handles a remote characteristic read request. Always produces
    /// exactly one response.
    pub fn characteristic_read_request(
        &self,
        dev: &DeviceId,
        req: RequestId,
        offset: usize,
        uuid: Uuid,
    ) {
        let (status, value) = match self.handler_for(uuid) {
            Some(h) => match h.read_characteristic(dev, uuid, offset) {
                Ok(v) => (Ok(()), v),
                Err(e) => {
                    warn!("Read of {uuid} from {dev} failed: {e}");
                    (Err(e.status()), Vec::new())
                }
            },
            None => (Err(ErrorCode::RequestNotSupported), Vec::new()),
        };
        self.respond(dev, req, status, offset, &value);
    }

    /// Handles a remote characteristic write request. A response is sent
    /// only when the client asked for one; write-without-response failures
    /// are dropped silently, as the protocol has no way to report them.
    pub fn characteristic_write_request(
        &self,
        dev: &DeviceId,
        req: RequestId,
        uuid: Uuid,
        value: &[u8],
        response_needed: bool,
    ) {
        let status = match self.handler_for(uuid) {
            Some(h) => h.write_characteristic(dev, uuid, value).map_err(|e| {
                warn!("Write of {uuid} from {dev} failed: {e}");
                e.status()
            }),
            None => Err(ErrorCode::RequestNotSupported),
        };
        if response_needed {
            self.respond(dev, req, status, 0, &[]);
        }
    }

    /// Handles a remote descriptor read request.
    pub fn descriptor_read_request(
        &self,
        dev: &DeviceId,
        req: RequestId,
        offset: usize,
        char_uuid: Uuid,
        desc_uuid: Uuid,
    ) {
        let (status, value) = match self.handler_for(char_uuid) {
            Some(h) => match h.read_descriptor(dev, char_uuid, desc_uuid, offset) {
                Ok(v) => (Ok(()), v),
                Err(e) => {
                    warn!("Read of {char_uuid} descriptor {desc_uuid} from {dev} failed: {e}");
                    (Err(e.status()), Vec::new())
                }
            },
            None => (Err(ErrorCode::RequestNotSupported), Vec::new()),
        };
        self.respond(dev, req, status, offset, &value);
    }

    /// Handles a remote descriptor write request.
    pub fn descriptor_write_request(
        &self,
        dev: &DeviceId,
        req: RequestId,
        char_uuid: Uuid,
        desc_uuid: Uuid,
        value: &[u8],
        response_needed: bool,
    ) {
        let status = match self.handler_for(char_uuid) {
            Some(h) => (h.write_descriptor(dev, char_uuid, desc_uuid, value)).map_err(|e| {
                warn!("Write of {char_uuid} descriptor {desc_uuid} from {dev} failed: {e}");
                e.status()
            }),
            None => Err(ErrorCode::RequestNotSupported),
        };
        if response_needed {
            self.respond(dev, req, status, 0, &[]);
        }
    }

    /// Handles a connection state change, forwarding it to every handler.
    pub fn connection_state_changed(&self, dev: &DeviceId, connected: bool) {
        info!(
            "Device {dev} {}",
            if connected { "connected" } else { "disconnected" }
        );
        let handlers = self.state.lock().handlers.clone();
        for h in &handlers {
            h.connection_changed(dev, connected);
        }
    }

    /// Returns the handler of the service hosting the specified
    /// characteristic.
    fn handler_for(&self, char_uuid: Uuid) -> Option<Arc<dyn ServiceHandler>> {
        (self.state.lock().handlers.iter())
            .find(|h| h.service().has_characteristic(char_uuid))
            .map(Arc::clone)
    }

    fn respond(&self, dev: &DeviceId, req: RequestId, status: RspStatus, offset: usize, value: &[u8]) {
        if let Err(e) = (self.transport).send_response(dev, req, status, offset, value) {
            warn!("Response to {dev} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use crate::transport::fake::{FakeTransport, Response};

    use super::*;

    #[derive(Debug)]
    struct EchoHandler(Service);

    impl EchoHandler {
        fn new() -> Arc<Self> {
            let c = Characteristic::new(
                Uuid::sig16(0x2A00),
                Prop::READ | Prop::WRITE,
                Access::READ_WRITE,
                [],
            );
            c.set_value(&[1, 2, 3]);
            Arc::new(Self(Service::new(Uuid::sig16(0x1800), [c])))
        }
    }

    impl ServiceHandler for EchoHandler {
        fn service(&self) -> &Service {
            &self.0
        }

        fn read_characteristic(
            &self,
            _dev: &DeviceId,
            uuid: Uuid,
            offset: usize,
        ) -> Result<Vec<u8>> {
            self.0.characteristic(uuid)?.read(offset)
        }

        fn write_characteristic(&self, _dev: &DeviceId, uuid: Uuid, value: &[u8]) -> Result<()> {
            self.0.characteristic(uuid)?.write(value)
        }
    }

    fn server() -> (Arc<FakeTransport>, Server) {
        let t = Arc::new(FakeTransport::default());
        let srv = Server::new(Arc::<FakeTransport>::clone(&t));
        srv.register_service(EchoHandler::new());
        srv.start();
        (t, srv)
    }

    #[test]
    fn read_routing() {
        let (t, srv) = server();
        let dev = DeviceId::from("AA:BB");
        srv.characteristic_read_request(&dev, 1, 0, Uuid::sig16(0x2A00));
        assert_eq!(
            t.take_responses(),
            [Response {
                dev: dev.clone(),
                req: 1,
                status: Ok(()),
                offset: 0,
                value: vec![1, 2, 3],
            }]
        );
        // Unknown characteristic still gets exactly one response.
        srv.characteristic_read_request(&dev, 2, 0, Uuid::sig16(0x2A37));
        assert_matches!(
            t.take_responses().as_slice(),
            [Response { req: 2, status: Err(ErrorCode::RequestNotSupported), .. }]
        );
    }

    #[test]
    fn write_routing() {
        let (t, srv) = server();
        let dev = DeviceId::from("AA:BB");
        srv.characteristic_write_request(&dev, 1, Uuid::sig16(0x2A00), &[9], true);
        assert_matches!(
            t.take_responses().as_slice(),
            [Response { req: 1, status: Ok(()), .. }]
        );
        // Write without response never produces a response, pass or fail.
        srv.characteristic_write_request(&dev, 2, Uuid::sig16(0x2A00), &[8], false);
        srv.characteristic_write_request(&dev, 3, Uuid::sig16(0x2A37), &[7], false);
        assert!(t.take_responses().is_empty());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_service() {
        let (_t, srv) = server();
        srv.register_service(EchoHandler::new());
    }
}
