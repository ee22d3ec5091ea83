use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a status column holds a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Lifecycle of a friendship row.
///
/// `Rejected` is never written: rejecting a request deletes the row. The
/// variant exists so that rows written by older deployments still parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for FriendshipStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan state machine:
///
/// ```text
/// borrowed --(borrower requests)--> return_requested --(lender approves)--> returned
///     ^                                   |
///     +--------(lender rejects)-----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Borrowed,
    ReturnRequested,
    Returned,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::ReturnRequested => "return_requested",
            Self::Returned => "returned",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(Self::Borrowed),
            "return_requested" => Ok(Self::ReturnRequested),
            "returned" => Ok(Self::Returned),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Nudge,
    FriendRequest,
    BorrowRequest,
    ReturnRequest,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nudge => "nudge",
            Self::FriendRequest => "friend_request",
            Self::BorrowRequest => "borrow_request",
            Self::ReturnRequest => "return_request",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nudge" => Ok(Self::Nudge),
            "friend_request" => Ok(Self::FriendRequest),
            "borrow_request" => Ok(Self::BorrowRequest),
            "return_request" => Ok(Self::ReturnRequest),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_parse_their_own_names() {
        for s in [
            FriendshipStatus::Pending,
            FriendshipStatus::Accepted,
            FriendshipStatus::Rejected,
        ] {
            assert_eq!(s.as_str().parse::<FriendshipStatus>().unwrap(), s);
        }
        for s in [
            ItemStatus::Borrowed,
            ItemStatus::ReturnRequested,
            ItemStatus::Returned,
        ] {
            assert_eq!(s.as_str().parse::<ItemStatus>().unwrap(), s);
        }
        assert!("lost".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn json_uses_snake_case() {
        let json = serde_json::to_string(&ItemStatus::ReturnRequested).unwrap();
        assert_eq!(json, "\"return_requested\"");
        let kind: NotificationKind = serde_json::from_str("\"friend_request\"").unwrap();
        assert_eq!(kind, NotificationKind::FriendRequest);
    }
}
