/// Controller shared between the polling loop and the bus context.
///
/// The bus handlers may run between any two instructions of the polling
/// loop, so every access goes through a critical section. Closures passed to
/// [`SharedController::with`] must stay short: no sensor reads, no bus I/O.
use core::cell::RefCell;

use critical_section::Mutex;

use crate::comm::Controller;

pub struct SharedController {
    inner: Mutex<RefCell<Controller>>,
}

impl SharedController {
    pub const fn new(flags: u8) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Controller::new(flags))),
        }
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with<R>(&self, f: impl FnOnce(&mut Controller) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.inner.borrow_ref_mut(cs)))
    }

    /// Bus receive handler.
    pub fn on_receive(&self, bytes: &[u8]) {
        self.with(|ctl| ctl.handle_receive(bytes));
    }

    /// Bus request handler.
    pub fn on_request(&self) -> [u8; crate::protocol::FRAME_LEN] {
        self.with(Controller::build_frame)
    }
}
