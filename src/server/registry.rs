use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Live sessions of one server.
///
/// Every session token is a child of the server's shutdown token, so
/// stopping the server closes all sessions. Individual sessions can also be
/// closed by a CancelRequest carrying their pid and secret key.
pub struct Registry {
    shutdown: CancellationToken,
    // pid -> SessionHandle
    sessions: Mutex<HashMap<i32, SessionHandle>>,
}

struct SessionHandle {
    secret_key: i32,
    cancel_token: CancellationToken,
}

impl Registry {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a session and returns the token that ends it.
    pub fn register(&self, pid: i32, secret_key: i32) -> CancellationToken {
        let token = self.shutdown.child_token();
        self.sessions.lock().insert(
            pid,
            SessionHandle {
                secret_key,
                cancel_token: token.clone(),
            },
        );
        token
    }

    pub fn unregister(&self, pid: i32) {
        self.sessions.lock().remove(&pid);
    }

    /// Cancels the session if the secret key matches. Returns whether it did.
    pub fn cancel(&self, pid: i32, secret_key: i32) -> bool {
        let sessions = self.sessions.lock();
        if let Some(handle) = sessions.get(&pid)
            && handle.secret_key == secret_key
        {
            handle.cancel_token.cancel();
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
