//! One-time password entry.
//!
//! `OtpInput` is the four-slot digit buffer behind the code boxes on the
//! login screen. `OtpFlow` pairs it with a verifier so that a code is
//! submitted exactly once, when its last digit lands.

use std::future::Future;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::api::auth::{normalize_mobile, OTP_LENGTH};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::User;

/// Result of feeding a keystroke to `OtpInput`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpEvent {
    /// Not a digit, or the buffer is already full.
    Ignored,
    /// Digits entered so far.
    Partial(usize),
    /// The buffer just became full. Emitted once per fill.
    Complete(String),
}

#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct OtpInput {
    digits: String,
    /// Set once `Complete` has been emitted for the current fill.
    fired: bool,
}

impl std::fmt::Debug for OtpInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpInput")
            .field("len", &self.digits.len())
            .field("fired", &self.fired)
            .finish()
    }
}

impl OtpInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == OTP_LENGTH
    }

    pub fn push(&mut self, c: char) -> OtpEvent {
        if !c.is_ascii_digit() || self.is_complete() {
            return OtpEvent::Ignored;
        }
        self.digits.push(c);
        if self.is_complete() && !self.fired {
            self.fired = true;
            OtpEvent::Complete(self.digits.clone())
        } else {
            OtpEvent::Partial(self.digits.len())
        }
    }

    pub fn backspace(&mut self) -> OtpEvent {
        self.digits.pop();
        self.fired = false;
        OtpEvent::Partial(self.digits.len())
    }

    pub fn clear(&mut self) {
        self.digits.zeroize();
        self.fired = false;
    }

    /// Replace the buffer with the digits found in `text` (an SMS
    /// autofill or clipboard paste). Separators are skipped; digits past
    /// the fourth are dropped.
    pub fn paste(&mut self, text: &str) -> OtpEvent {
        self.clear();
        let mut last = OtpEvent::Partial(0);
        for c in text.chars().filter(char::is_ascii_digit).take(OTP_LENGTH) {
            last = self.push(c);
        }
        last
    }
}

/// Backend side of the OTP login. Implemented by `ApiClient`.
pub trait OtpVerifier: Send + Sync {
    fn request_code(&self, mobile: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn verify_code(
        &self,
        mobile: &str,
        otp: &str,
    ) -> impl Future<Output = Result<Option<User>, ClientError>> + Send;
}

impl OtpVerifier for ApiClient {
    async fn request_code(&self, mobile: &str) -> Result<(), ClientError> {
        self.request_otp(mobile).await
    }

    async fn verify_code(&self, mobile: &str, otp: &str) -> Result<Option<User>, ClientError> {
        self.verify_otp(mobile, otp).await
    }
}

impl<T: OtpVerifier> OtpVerifier for &T {
    async fn request_code(&self, mobile: &str) -> Result<(), ClientError> {
        (**self).request_code(mobile).await
    }

    async fn verify_code(&self, mobile: &str, otp: &str) -> Result<Option<User>, ClientError> {
        (**self).verify_code(mobile, otp).await
    }
}

/// Where an `OtpFlow` stands after a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpStep {
    /// Still collecting digits.
    Entering(usize),
    /// Code accepted; the session holds fresh credentials.
    Verified(Option<User>),
}

/// Login-screen driver: request a code, collect digits, verify once.
pub struct OtpFlow<V> {
    verifier: V,
    mobile: String,
    input: OtpInput,
}

impl<V: OtpVerifier> OtpFlow<V> {
    /// Fails with `InvalidInput` unless `mobile` has ten digits.
    pub fn new(verifier: V, mobile: &str) -> Result<Self, ClientError> {
        Ok(Self {
            verifier,
            mobile: normalize_mobile(mobile)?,
            input: OtpInput::new(),
        })
    }

    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    pub fn input(&self) -> &OtpInput {
        &self.input
    }

    /// Ask the backend to send (or resend) the code and reset the boxes.
    pub async fn send_code(&mut self) -> Result<(), ClientError> {
        self.input.clear();
        self.verifier.request_code(&self.mobile).await
    }

    pub async fn push(&mut self, c: char) -> Result<OtpStep, ClientError> {
        let event = self.input.push(c);
        self.handle(event).await
    }

    pub async fn paste(&mut self, text: &str) -> Result<OtpStep, ClientError> {
        let event = self.input.paste(text);
        self.handle(event).await
    }

    pub fn backspace(&mut self) -> OtpStep {
        self.input.backspace();
        OtpStep::Entering(self.input.len())
    }

    async fn handle(&mut self, event: OtpEvent) -> Result<OtpStep, ClientError> {
        let OtpEvent::Complete(mut code) = event else {
            return Ok(OtpStep::Entering(self.input.len()));
        };

        let result = self.verifier.verify_code(&self.mobile, &code).await;
        code.zeroize();
        match result {
            Ok(user) => Ok(OtpStep::Verified(user)),
            Err(e) => {
                // Wrong or expired code: empty the boxes for another try.
                tracing::info!(error = %e, "OTP verification failed");
                self.input.clear();
                Err(e)
            }
        }
    }
}
