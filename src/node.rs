//! Node references for a simulated network.
//!
//! The announcer only needs an identity label and a data source URL per
//! node, so anything implementing [`NodeReference`] can be announced.
//! [`provision`] creates a node whose database lives in a [`Databases`]
//! namespace, for callers that have no network of their own.

use std::fmt;

use crate::database::{DatabaseError, Databases};
use crate::endpoint::mem_url;

/// Read-only view of a network participant.
pub trait NodeReference {
    /// Organisation name of the node's legal identity.
    fn organisation(&self) -> &str;
    /// URL of the node's data source, e.g. `jdbc:h2:mem:bankA;...`.
    fn data_source_url(&self) -> &str;
}

impl<N: NodeReference + ?Sized> NodeReference for &N {
    fn organisation(&self) -> &str {
        (**self).organisation()
    }

    fn data_source_url(&self) -> &str {
        (**self).data_source_url()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    organisation: String,
    data_source_url: String,
}

impl NodeInfo {
    pub fn new(organisation: impl Into<String>, data_source_url: impl Into<String>) -> Self {
        Self {
            organisation: organisation.into(),
            data_source_url: data_source_url.into(),
        }
    }
}

impl NodeReference for NodeInfo {
    fn organisation(&self) -> &str {
        &self.organisation
    }

    fn data_source_url(&self) -> &str {
        &self.data_source_url
    }
}

/// One notary plus any number of parties.
///
/// Iteration yields the notary first, then parties in the order given.
#[derive(Debug, Clone)]
pub struct NodeSet<N> {
    notary: N,
    parties: Vec<N>,
}

impl<N> NodeSet<N> {
    pub fn new(notary: N, parties: Vec<N>) -> Self {
        Self { notary, parties }
    }

    pub fn notary(&self) -> &N {
        &self.notary
    }

    pub fn parties(&self) -> &[N] {
        &self.parties
    }

    pub fn iter(&self) -> impl Iterator<Item = &N> {
        std::iter::once(&self.notary).chain(self.parties.iter())
    }

    /// Number of nodes, notary included; never zero.
    pub fn len(&self) -> usize {
        1 + self.parties.len()
    }

    /// Always false: a set holds at least its notary.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Notary,
    Party,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Notary => f.write_str("notary"),
            Role::Party => f.write_str("party"),
        }
    }
}

/// Table every provisioned database starts with.
pub const NODE_INFO_TABLE: &str = "node_info";

/// Creates a node with its own in-memory database.
///
/// The database is named after the organisation (see [`database_name_for`])
/// and seeded with a `node_info(organisation, role)` row.
pub fn provision(
    databases: &Databases,
    organisation: &str,
    role: Role,
) -> Result<NodeInfo, DatabaseError> {
    let name = database_name_for(organisation);
    if name.is_empty() {
        return Err(DatabaseError::Syntax {
            message: format!("organisation \"{}\" has no usable characters", organisation),
        });
    }

    let db = databases.create(&name)?;
    db.create_table(NODE_INFO_TABLE, &["organisation", "role"])?;
    db.insert(
        NODE_INFO_TABLE,
        vec![Some(organisation.to_string()), Some(role.to_string())],
    )?;

    Ok(NodeInfo::new(organisation, mem_url(&name)))
}

/// Lower-camel database name from an organisation: `Bank of Corda` -> `bankOfCorda`.
///
/// Only ASCII alphanumerics survive, so the name never contains the `;` or
/// `:` delimiters of a data source URL.
pub fn database_name_for(organisation: &str) -> String {
    let mut name = String::new();
    for word in organisation
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if name.is_empty() {
                name.push(first.to_ascii_lowercase());
            } else {
                name.push(first.to_ascii_uppercase());
            }
            name.push_str(chars.as_str());
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::database_name;

    #[test]
    fn test_node_set_order() {
        let nodes = NodeSet::new(
            NodeInfo::new("Notary", "jdbc:h2:mem:notary"),
            vec![
                NodeInfo::new("Party B", "jdbc:h2:mem:partyB"),
                NodeInfo::new("Party A", "jdbc:h2:mem:partyA"),
            ],
        );
        let orgs: Vec<_> = nodes.iter().map(|n| n.organisation()).collect();
        assert_eq!(orgs, vec!["Notary", "Party B", "Party A"]);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes.notary().organisation(), "Notary");
        assert_eq!(nodes.parties().len(), 2);
    }

    #[test]
    fn test_database_name_for() {
        assert_eq!(database_name_for("Bank A"), "bankA");
        assert_eq!(database_name_for("Bank of Corda"), "bankOfCorda");
        assert_eq!(database_name_for("notary"), "notary");
        assert_eq!(database_name_for("O=Party;C:GB"), "oPartyCGB");
        assert_eq!(database_name_for("  ;; "), "");
    }

    #[test]
    fn test_provision_seeds_node_info() {
        let databases = Databases::new();
        let node = provision(&databases, "Bank A", Role::Party).unwrap();

        assert_eq!(node.organisation(), "Bank A");
        assert_eq!(database_name(node.data_source_url()).unwrap(), "bankA");

        let table = databases.get("bankA").unwrap().table(NODE_INFO_TABLE).unwrap();
        assert_eq!(
            table.rows,
            vec![vec![Some("Bank A".to_string()), Some("party".to_string())]]
        );
    }

    #[test]
    fn test_provision_duplicate_organisation() {
        let databases = Databases::new();
        provision(&databases, "Notary", Role::Notary).unwrap();
        assert!(matches!(
            provision(&databases, "notary", Role::Party),
            Err(DatabaseError::DuplicateDatabase { .. })
        ));
    }

    #[test]
    fn test_provision_rejects_unusable_name() {
        let databases = Databases::new();
        assert!(provision(&databases, "!!!", Role::Party).is_err());
        assert!(databases.names().is_empty());
    }
}
