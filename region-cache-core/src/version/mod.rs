//! Version stamps, version tags, the conflict algorithm, and the
//! process-wide member interning table (spec §4.5).

mod member_list;
mod stamp;

pub use member_list::MemberListForVersionStamp;
pub use stamp::{process_version_tag, ConflictOutcome, VersionStamp, VersionTag};
