mod auth;
mod correlation;
mod error;
mod oauth;
mod session;

pub use auth::{evaluate, Admission, AuthState, Authenticator, CallbackParams};
pub use correlation::{
    random_token, CorrelationTokens, MemoryTokenStore, RedisTokenStore, TokenStore, TOKEN_BYTES,
};
pub use error::SecurityError;
pub use oauth::{AuthorizationRequest, OAuthTokenResult, OAuthWorkflow, TokenExchanger};
pub use session::{cookie_key, SessionStore};
