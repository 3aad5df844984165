//! Backend endpoint paths

pub const AUTH_TOKEN: &str = "/v1/auth/token";
pub const AUTH_REFRESH: &str = "/v1/auth/refresh";
pub const AUTH_LOGOUT: &str = "/v1/auth/logout";

pub const MEMBERS_ME: &str = "/v1/members/me";
pub const LIFESTYLES: &str = "/v1/lifestyles";

pub const EASY_CONTRACTS: &str = "/v1/easy-contracts";
pub const PRESIGNED_URLS: &str = "/v1/file-assets/presigned-urls";
pub const FILE_ASSETS: &str = "/v1/file-assets";

pub const HOME_NOTES: &str = "/v1/home-notes";

pub const PROPERTY_POSTS: &str = "/v2/property-posts";

pub const SSE_CONNECTION: &str = "/v2/sse/connection";
