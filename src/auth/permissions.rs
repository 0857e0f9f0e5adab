/*!
 * # Permissions
 *
 * Permissions are `resource:action` strings. A role maps to a fixed list of
 * grants, where `resource:*` covers every action on the resource.
 */

use crate::models::Role;

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const WRITE: &'static str = "write";
    pub const ALL: &'static str = "*";
}

/// Permission string constants
pub mod consts {
    pub const CUSTOMERS_READ: &str = "customers:read";
    pub const CUSTOMERS_WRITE: &str = "customers:write";
    pub const SUPPLIERS_READ: &str = "suppliers:read";
    pub const SUPPLIERS_WRITE: &str = "suppliers:write";
    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_WRITE: &str = "products:write";
    pub const STOCK_READ: &str = "stock:read";
    pub const STOCK_WRITE: &str = "stock:write";
    pub const SALES_READ: &str = "sales:read";
    pub const SALES_WRITE: &str = "sales:write";
    pub const POS_CHECKOUT: &str = "pos:write";
    pub const QUOTES_READ: &str = "quotes:read";
    pub const QUOTES_WRITE: &str = "quotes:write";
    pub const CRM_READ: &str = "crm:read";
    pub const CRM_WRITE: &str = "crm:write";
    pub const FINANCE_READ: &str = "finance:read";
    pub const FINANCE_WRITE: &str = "finance:write";
    pub const PROJECTS_READ: &str = "projects:read";
    pub const PROJECTS_WRITE: &str = "projects:write";
    pub const DASHBOARD_READ: &str = "dashboard:read";
    pub const USERS_MANAGE: &str = "users:*";
}

/// Grants held by a role
pub fn permissions_for(role: Role) -> Vec<String> {
    let grants: &[&str] = match role {
        Role::Admin => &["*:*"],
        Role::Manager => &[
            "customers:*",
            "suppliers:*",
            "products:*",
            "stock:*",
            "sales:*",
            "pos:*",
            "quotes:*",
            "crm:*",
            "finance:*",
            "projects:*",
            "dashboard:*",
        ],
        Role::Staff => &[
            "customers:*",
            "suppliers:read",
            "products:read",
            "stock:read",
            "sales:*",
            "pos:*",
            "quotes:*",
            "crm:*",
            "projects:*",
            "dashboard:read",
        ],
    };
    grants.iter().map(|g| g.to_string()).collect()
}

/// Whether one grant covers the required permission
pub fn grant_covers(grant: &str, required: &str) -> bool {
    if grant == required {
        return true;
    }
    let (Some((grant_resource, grant_action)), Some((resource, _))) =
        (grant.split_once(':'), required.split_once(':'))
    else {
        return false;
    };
    grant_action == Actions::ALL && (grant_resource == Actions::ALL || grant_resource == resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("customers:read", "customers:read" => true)]
    #[test_case("customers:*", "customers:write" => true)]
    #[test_case("*:*", "finance:write" => true)]
    #[test_case("customers:read", "customers:write" => false)]
    #[test_case("customers:*", "finance:read" => false)]
    #[test_case("garbage", "finance:read" => false)]
    fn grants(grant: &str, required: &str) -> bool {
        grant_covers(grant, required)
    }

    #[test]
    fn staff_cannot_touch_finance_or_write_products() {
        let staff = permissions_for(Role::Staff);
        let holds = |p: &str| staff.iter().any(|g| grant_covers(g, p));
        assert!(holds(consts::SALES_WRITE));
        assert!(holds(consts::PRODUCTS_READ));
        assert!(!holds(consts::PRODUCTS_WRITE));
        assert!(!holds(consts::FINANCE_READ));
        assert!(!holds(consts::USERS_MANAGE));
    }
}
