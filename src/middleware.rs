//! actix-web integration.
//!
//! [`SessionMiddleware`] loads the session before the handler runs and writes
//! the cookie after it returns. Handlers reach the session through the
//! [`RequestSession`] extractor.
//!
//! ```rust,ignore
//! use sealed_session::{middleware::{RequestSession, SessionMiddleware}, SessionManager};
//!
//! async fn index(session: RequestSession) -> actix_web::Result<String> {
//!     let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
//!     session.insert("visits", visits)?;
//!     Ok(format!("visit #{visits}"))
//! }
//!
//! App::new()
//!     .wrap(SessionMiddleware::new(manager.clone()))
//!     .route("/", web::get().to(index))
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ok, ready, LocalBoxFuture, Ready};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::SessionError;
use crate::session::{CookieOptions, Session, SessionManager};

/// Session middleware for actix-web
#[derive(Clone)]
pub struct SessionMiddleware {
    manager: SessionManager,
}

impl SessionMiddleware {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionMiddlewareService {
            service: Rc::new(service),
            manager: self.manager.clone(),
        })
    }
}

/// The actual middleware service.
pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    manager: SessionManager,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let manager = self.manager.clone();

        Box::pin(async move {
            let token = req
                .cookie(manager.cookie_name())
                .map(|cookie| cookie.value().to_owned());
            let session = manager.load_session(token.as_deref()).await;

            let handle = RequestSession::new(session);
            req.extensions_mut().insert(handle.clone());

            let mut res = service.call(req).await?;

            if let Some(cookie) = manager.finalize(handle.take()).await.into_cookie() {
                res.response_mut().add_cookie(&cookie)?;
            }
            Ok(res)
        })
    }
}

/// Handle to the current request's session
///
/// Cheap to clone; all clones share the same session. Operations on a session
/// that has already been finalized are no-ops.
#[derive(Clone)]
pub struct RequestSession(Rc<RefCell<Option<Session>>>);

impl RequestSession {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self(Rc::new(RefCell::new(Some(session))))
    }

    /// Remove the session from the handle, leaving it empty
    #[must_use]
    pub fn take(&self) -> Option<Session> {
        self.0.borrow_mut().take()
    }

    /// Run `f` against the session, if it is still attached
    pub fn with<R>(&self, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.0.borrow().as_ref().map(f)
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.0.borrow_mut().as_mut().map(f)
    }

    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.with(|session| session.get(key)).flatten()
    }

    /// # Errors
    ///
    /// Returns `SessionError::Serialization` if `value` cannot be represented
    /// as JSON.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<(), SessionError> {
        self.with_mut(|session| session.insert(key, value))
            .unwrap_or(Ok(()))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.with_mut(|session| session.remove(key)).flatten()
    }

    pub fn clear(&self) {
        self.with_mut(Session::clear);
    }

    pub fn touch(&self) {
        self.with_mut(Session::touch);
    }

    pub fn set_cookie_options(&self, options: CookieOptions) {
        self.with_mut(|session| session.set_cookie_options(options));
    }

    /// Write back a session updated outside the handle. A session taken in
    /// the meantime stays taken.
    fn replace_attached(&self, session: Session) {
        self.with_mut(|attached| *attached = session);
    }

    /// Destroy the session. Without an attached session this does nothing.
    ///
    /// The store call runs against a copy; the attached session only changes
    /// once it completes, so a cancelled call leaves it intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails or times out.
    pub async fn destroy(&self) -> Result<(), SessionError> {
        let Some(mut session) = self.with(Session::clone) else {
            return Ok(());
        };
        let result = session.destroy().await;
        self.replace_attached(session);
        result
    }

    /// Issue a new identity for the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the old store record cannot be removed.
    pub async fn regenerate(&self) -> Result<(), SessionError> {
        let Some(mut session) = self.with(Session::clone) else {
            return Ok(());
        };
        let result = session.regenerate().await;
        self.replace_attached(session);
        result
    }
}

impl FromRequest for RequestSession {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(req.extensions().get::<Self>().cloned().ok_or_else(|| {
            log::error!("RequestSession extracted without SessionMiddleware installed");
            ErrorInternalServerError("Session middleware is not installed")
        }))
    }
}

impl actix_web::ResponseError for SessionError {}
