mod envelope;
mod handler;
mod mapping;
mod report;
mod stats;
mod xray;

pub use envelope::{Envelope, ErrorResponse, HandlerResult, HealthResponse, SuccessResponse};
pub use handler::{
    AddUserRequest, AddUsersRequest, HashData, InboundUsersCountResponse, InboundUsersResponse,
    ProvisionedUser, ProvisionedUserData, RemoveUserRequest, RemoveUsersRequest, RemovedUser,
    UserEntry,
};
pub use mapping::{
    BatchMappingRequest, BatchRemoveMappingRequest, MappingRequest, RemoveMappingRequest,
};
pub use report::{BatchReportRequest, ReportIdentity, ReportRequest, ValidatedReport};
pub use stats::{
    AllInboundsResponse, AllOutboundsResponse, CombinedStatsResponse, DetailedStatsResponse,
    InboundTraffic, OnlineStatusRequest, OnlineStatusResponse, OutboundTraffic, ResetRequest,
    SystemStats, TagStatsRequest, UserDetail, UserTraffic, UsersStatsResponse,
};
pub use xray::{
    InboundDecl, NodeInfo, OutboundDecl, XrayConfig, XrayHealthResponse, XrayStartRequest,
    XrayStartResponse, XrayStatusResponse, XrayStopResponse,
};
