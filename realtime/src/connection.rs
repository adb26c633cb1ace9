use chrono::{DateTime, Utc};
use events::Id;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// A serialized outbound frame. Serialized once per broadcast and shared by
/// every connection that receives it.
pub type OutboundFrame = Arc<str>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is on the other end of a connection, which decides what they may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Authenticated staff dashboard.
    Dashboard,
    /// Unauthenticated terminal authorized by a display token.
    PublicDisplay,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Dashboard => f.write_str("dashboard"),
            Audience::PublicDisplay => f.write_str("public_display"),
        }
    }
}

/// The credential a connection was admitted with. Used to drop connections
/// when that credential is revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    User(Id),
    DisplayToken(Id),
}

/// A live consumer connection as seen by the hub.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub tenant_id: Id,
    pub class_filter: Option<Id>,
    pub audience: Audience,
    pub principal: Principal,
    pub connected_at: DateTime<Utc>,
    sender: Sender<OutboundFrame>,
}

impl Connection {
    /// Creates a connection and the receiving half of its bounded outbound
    /// buffer. The socket task owns the receiver; once the hub drops the
    /// connection the receiver yields `None` and the socket should close.
    pub fn new(
        tenant_id: Id,
        class_filter: Option<Id>,
        audience: Audience,
        principal: Principal,
        buffer: usize,
    ) -> (Self, Receiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let connection = Self {
            id: ConnectionId::new(),
            tenant_id,
            class_filter,
            audience,
            principal,
            connected_at: Utc::now(),
            sender,
        };
        (connection, receiver)
    }

    pub(crate) fn try_deliver(
        &self,
        frame: OutboundFrame,
    ) -> Result<(), TrySendError<OutboundFrame>> {
        self.sender.try_send(frame)
    }
}

/// Which dashboards of a tenant a broadcast reaches, by class subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardScope {
    /// Every dashboard, whatever it is subscribed to.
    All,
    /// School-wide dashboards plus those subscribed to this class.
    Class(Id),
    /// Only dashboards whose subscription is exactly this one. `None` selects
    /// the school-wide dashboards.
    Subscription(Option<Id>),
}

/// Selects the connections a broadcast is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastFilter {
    pub tenant_id: Id,
    pub scope: DashboardScope,
    pub audience: Audience,
}

impl BroadcastFilter {
    /// Dashboards interested in `class_id`; with no class, every dashboard
    /// of the tenant.
    pub fn dashboards(tenant_id: Id, class_id: Option<Id>) -> Self {
        let scope = match class_id {
            Some(class_id) => DashboardScope::Class(class_id),
            None => DashboardScope::All,
        };
        Self {
            tenant_id,
            scope,
            audience: Audience::Dashboard,
        }
    }

    /// Dashboards whose class subscription equals `class_filter`.
    pub fn subscribed(tenant_id: Id, class_filter: Option<Id>) -> Self {
        Self {
            tenant_id,
            scope: DashboardScope::Subscription(class_filter),
            audience: Audience::Dashboard,
        }
    }

    /// Public displays match on tenant only.
    pub fn public_displays(tenant_id: Id) -> Self {
        Self {
            tenant_id,
            scope: DashboardScope::All,
            audience: Audience::PublicDisplay,
        }
    }

    pub fn matches(&self, connection: &Connection) -> bool {
        if connection.tenant_id != self.tenant_id || connection.audience != self.audience {
            return false;
        }

        match self.audience {
            Audience::PublicDisplay => true,
            Audience::Dashboard => match self.scope {
                DashboardScope::All => true,
                DashboardScope::Class(class_id) => match connection.class_filter {
                    None => true,
                    Some(filter) => filter == class_id,
                },
                DashboardScope::Subscription(class_filter) => {
                    connection.class_filter == class_filter
                }
            },
        }
    }
}
