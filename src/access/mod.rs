/*!
 * # Access Control Module
 *
 * Pure authorization evaluation for tenant-scoped actions. The evaluator is
 * a function of (principal, system, employment record, required role set);
 * it never touches the database and never raises. Callers load the system
 * and the caller's employment row, then gate the operation here before any
 * state change.
 *
 * Ownership always wins: the system owner short-circuits before any role
 * logic. Everyone else must hold an active employment in the target system
 * with a role drawn from the static action table for that system category.
 */

pub mod extract;

use lazy_static::lazy_static;
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::{
    employee::{self, EmployeeRole},
    system::{self, SystemCategory},
};
use crate::errors::ServiceError;

/// The authenticated caller, passed explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Every gated operation in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ManageEmployees,
    ViewCatalog,
    ManageProducts,
    ManageSuppliers,
    ManagePurchaseOrders,
    ReceiveGoods,
    RecordSales,
    VoidSales,
    ViewInventoryReports,
}

/// Sentinel role set: any active employee of the system is authorized.
const ANY_ACTIVE_EMPLOYEE: &[EmployeeRole] = &[];

lazy_static! {
    /// Static action table: (system category, action) → allowed role set.
    ///
    /// An empty set means "any active employee"; the system owner is always
    /// authorized regardless of this table.
    static ref ACTION_ROLES: HashMap<(SystemCategory, Action), &'static [EmployeeRole]> = {
        use Action::*;
        use EmployeeRole::*;
        use SystemCategory::*;

        let mut table: HashMap<(SystemCategory, Action), &'static [EmployeeRole]> = HashMap::new();

        // Restaurant role family
        table.insert((Restaurant, ViewCatalog), ANY_ACTIVE_EMPLOYEE);
        table.insert((Restaurant, ManageEmployees), &[Manager]);
        table.insert((Restaurant, ManageProducts), &[Manager, HeadChef]);
        table.insert((Restaurant, ManageSuppliers), &[Manager, InventoryManager]);
        table.insert((Restaurant, ManagePurchaseOrders), &[Manager, InventoryManager]);
        table.insert((Restaurant, ReceiveGoods), &[Manager, InventoryManager]);
        table.insert((Restaurant, RecordSales), &[Manager, Cashier, Waiter]);
        table.insert((Restaurant, VoidSales), &[Manager]);
        table.insert((Restaurant, ViewInventoryReports), &[Manager, InventoryManager]);

        // Supermarket role family
        table.insert((Supermarket, ViewCatalog), ANY_ACTIVE_EMPLOYEE);
        table.insert((Supermarket, ManageEmployees), &[ManagerSupermarket]);
        table.insert(
            (Supermarket, ManageProducts),
            &[ManagerSupermarket, InventoryManagerSupermarket],
        );
        table.insert(
            (Supermarket, ManageSuppliers),
            &[ManagerSupermarket, InventoryManagerSupermarket],
        );
        table.insert(
            (Supermarket, ManagePurchaseOrders),
            &[ManagerSupermarket, InventoryManagerSupermarket],
        );
        table.insert(
            (Supermarket, ReceiveGoods),
            &[ManagerSupermarket, InventoryManagerSupermarket],
        );
        table.insert(
            (Supermarket, RecordSales),
            &[ManagerSupermarket, CashierSupermarket],
        );
        table.insert((Supermarket, VoidSales), &[ManagerSupermarket]);
        table.insert(
            (Supermarket, ViewInventoryReports),
            &[ManagerSupermarket, InventoryManagerSupermarket],
        );

        table
    };
}

/// The role family that may be assigned to employees of a system category.
pub fn category_roles(category: SystemCategory) -> &'static [EmployeeRole] {
    use EmployeeRole::*;
    match category {
        SystemCategory::Restaurant => &[
            Waiter,
            Chef,
            Delivery,
            Manager,
            HeadChef,
            Cashier,
            InventoryManager,
        ],
        SystemCategory::Supermarket => &[
            CashierSupermarket,
            ManagerSupermarket,
            InventoryManagerSupermarket,
        ],
    }
}

/// Returns the role set permitted to perform `action` in a system of the
/// given category. Unknown combinations admit no employee role.
pub fn allowed_roles(category: SystemCategory, action: Action) -> &'static [EmployeeRole] {
    ACTION_ROLES
        .get(&(category, action))
        .copied()
        .unwrap_or(&[])
}

/// Pure authorization predicate.
///
/// Returns true iff the principal owns the system, or holds an active
/// employment in exactly this system whose role is in `required_roles`
/// (an empty or absent role set admits any active employee). All failure
/// modes return false; this function never errors.
pub fn is_authorized(
    principal: &Principal,
    system: &system::Model,
    employment: Option<&employee::Model>,
    required_roles: Option<&[EmployeeRole]>,
) -> bool {
    // Ownership short-circuits before any role enumeration.
    if system.owner_id == principal.user_id {
        return true;
    }

    let Some(emp) = employment else {
        return false;
    };

    if emp.user_id != principal.user_id || emp.system_id != system.id || !emp.is_active {
        return false;
    }

    match required_roles {
        None => true,
        Some(roles) if roles.is_empty() => true,
        Some(roles) => roles.contains(&emp.role),
    }
}

/// Gate an action: resolves the role set from the static table and maps a
/// deny to `ServiceError::Forbidden`.
pub fn authorize(
    principal: &Principal,
    system: &system::Model,
    employment: Option<&employee::Model>,
    action: Action,
) -> Result<(), ServiceError> {
    let roles = allowed_roles(system.category, action);
    if is_authorized(principal, system, employment, Some(roles)) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "not permitted to perform {:?} on system {}",
            action, system.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn system(owner: Uuid, category: SystemCategory) -> system::Model {
        system::Model {
            id: 1,
            uuid: Uuid::new_v4(),
            name: "Corner Market".into(),
            owner_id: owner,
            category,
            description: String::new(),
            is_active: true,
            is_public: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn employee(user: Uuid, system_id: i64, role: EmployeeRole, active: bool) -> employee::Model {
        employee::Model {
            id: 7,
            user_id: user,
            system_id,
            name: "Sam".into(),
            role,
            phone: None,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_always_authorized() {
        let owner = Uuid::new_v4();
        let sys = system(owner, SystemCategory::Supermarket);
        let principal = Principal::new(owner);

        // Even with no employment record and a restrictive role set.
        assert!(is_authorized(
            &principal,
            &sys,
            None,
            Some(&[EmployeeRole::ManagerSupermarket]),
        ));
        assert!(authorize(&principal, &sys, None, Action::ManageEmployees).is_ok());
    }

    #[test]
    fn unknown_principal_denied() {
        let sys = system(Uuid::new_v4(), SystemCategory::Restaurant);
        let stranger = Principal::new(Uuid::new_v4());
        assert!(!is_authorized(&stranger, &sys, None, None));
    }

    #[test]
    fn active_employee_passes_empty_role_set() {
        let user = Uuid::new_v4();
        let sys = system(Uuid::new_v4(), SystemCategory::Restaurant);
        let emp = employee(user, sys.id, EmployeeRole::Waiter, true);
        let principal = Principal::new(user);

        assert!(is_authorized(&principal, &sys, Some(&emp), None));
        assert!(is_authorized(&principal, &sys, Some(&emp), Some(&[])));
    }

    #[test]
    fn inactive_employee_denied() {
        let user = Uuid::new_v4();
        let sys = system(Uuid::new_v4(), SystemCategory::Restaurant);
        let emp = employee(user, sys.id, EmployeeRole::Manager, false);
        let principal = Principal::new(user);

        assert!(!is_authorized(&principal, &sys, Some(&emp), None));
    }

    #[test]
    fn employment_must_match_system_and_user() {
        let user = Uuid::new_v4();
        let sys = system(Uuid::new_v4(), SystemCategory::Restaurant);
        let principal = Principal::new(user);

        let other_system = employee(user, 99, EmployeeRole::Manager, true);
        assert!(!is_authorized(&principal, &sys, Some(&other_system), None));

        let other_user = employee(Uuid::new_v4(), sys.id, EmployeeRole::Manager, true);
        assert!(!is_authorized(&principal, &sys, Some(&other_user), None));
    }

    #[test]
    fn role_membership_enforced() {
        let user = Uuid::new_v4();
        let sys = system(Uuid::new_v4(), SystemCategory::Restaurant);
        let waiter = employee(user, sys.id, EmployeeRole::Waiter, true);
        let principal = Principal::new(user);

        // A waiter may record sales but not create purchase orders.
        assert!(authorize(&principal, &sys, Some(&waiter), Action::RecordSales).is_ok());
        let denied = authorize(&principal, &sys, Some(&waiter), Action::ManagePurchaseOrders);
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn supermarket_roles_do_not_leak_into_restaurants() {
        let user = Uuid::new_v4();
        let sys = system(Uuid::new_v4(), SystemCategory::Restaurant);
        let emp = employee(user, sys.id, EmployeeRole::ManagerSupermarket, true);
        let principal = Principal::new(user);

        assert!(authorize(&principal, &sys, Some(&emp), Action::ManageProducts).is_err());
    }

    #[test]
    fn action_table_covers_both_categories() {
        for action in [
            Action::ManageEmployees,
            Action::ViewCatalog,
            Action::ManageProducts,
            Action::ManageSuppliers,
            Action::ManagePurchaseOrders,
            Action::ReceiveGoods,
            Action::RecordSales,
            Action::VoidSales,
            Action::ViewInventoryReports,
        ] {
            for category in [SystemCategory::Restaurant, SystemCategory::Supermarket] {
                assert!(
                    ACTION_ROLES.contains_key(&(category, action)),
                    "missing table entry for {:?}/{:?}",
                    category,
                    action
                );
            }
        }
    }
}
