pub mod jwt_external;
pub mod local;
pub mod middleware;

pub use jwt_external::{Claims as ExternalClaims, JwksVerifier};
pub use local::{AuthResponse, LocalAuthService, LocalClaims};
pub use middleware::{auth_middleware, AuthConfig, AuthVerifier, AuthenticatedPrincipal};
