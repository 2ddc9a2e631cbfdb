/// Router Module Index
///
/// Routes are split by access level so authentication is applied per module as
/// a router layer rather than remembered per handler.

/// Pages readable by anyone. Handlers apply the visibility rule themselves.
pub mod public;

/// Routes behind the `AuthUser` middleware layer.
pub mod authenticated;

/// Category, location and moderation routes for the `admin` role.
pub mod admin;
