//! Interfaces to the external collaborators of this core: the user
//! directory, the application registry, the flow engine and the JWT
//! service. Production implementations live next to each trait;
//! tests swap in in-memory variants at composition time.

pub mod directory;
pub mod flow;
pub mod jwt;
pub mod registry;

pub use directory::{DirectoryUser, RestUserDirectory, UserDirectory};
pub use flow::{FlowEngine, FlowInitRequest, FlowInitResponse, RestFlowEngine, FLOW_TYPE_AUTHENTICATION};
pub use jwt::{AssertionVerifier, JwtAssertionVerifier};
pub use registry::{ApplicationRegistry, SqlApplicationRegistry};
