pub mod cell;
pub mod email;
pub mod error;
pub mod headers;
pub mod model;
pub mod time;

pub use cell::{CellValue, Grid, Row, is_disabled_value};
pub use email::{generate_group_email, normalize_email, parse_single_email, split_tokens};
pub use error::{CoreError, ErrorCategory, Result};
pub use headers::{HeaderMap, normalize_header};
pub use model::{
    FolderBinding, FolderRole, GroupBinding, MemberRole, MembershipEntry, group_sheet_name_for,
    user_sheet_name_for,
};
pub use time::{Timestamp, now_utc};
