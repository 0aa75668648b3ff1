// InterfaceRegistry - who implements which interface for an address
//
// Every address is its own manager until it delegates. Only the current
// manager may change implementers or hand over management.

use super::abi::Args;
use super::{CallContext, Revert};
use crate::execution::gas::costs;
use crate::types::{Address, Hash};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Hash identifying an interface name
pub fn interface_hash(name: &str) -> Hash {
    Hash::hash(name.as_bytes())
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    implementers: BTreeMap<(Address, Hash), Address>,
    managers: BTreeMap<Address, Address>,
}

impl InterfaceRegistry {
    pub const KIND: &'static str = "InterfaceRegistry";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_manager(&self, address: &Address) -> Address {
        self.managers.get(address).copied().unwrap_or(*address)
    }

    pub fn set_manager(
        &mut self,
        caller: Address,
        address: Address,
        new_manager: Address,
    ) -> Result<(), Revert> {
        self.ensure_manager(caller, address)?;
        if new_manager == address || new_manager.is_zero() {
            self.managers.remove(&address);
        } else {
            self.managers.insert(address, new_manager);
        }
        Ok(())
    }

    /// Zero address when nothing is registered
    pub fn get_interface_implementer(&self, address: &Address, iface: &Hash) -> Address {
        self.implementers
            .get(&(*address, *iface))
            .copied()
            .unwrap_or(Address::ZERO)
    }

    pub fn set_interface_implementer(
        &mut self,
        caller: Address,
        address: Address,
        iface: Hash,
        implementer: Address,
    ) -> Result<(), Revert> {
        self.ensure_manager(caller, address)?;
        if implementer.is_zero() {
            self.implementers.remove(&(address, iface));
        } else {
            self.implementers.insert((address, iface), implementer);
        }
        Ok(())
    }

    fn ensure_manager(&self, caller: Address, address: Address) -> Result<(), Revert> {
        if self.get_manager(&address) != caller {
            return Err(Revert::Unauthorized(format!(
                "{} is not the manager of {}",
                caller, address
            )));
        }
        Ok(())
    }

    pub(crate) fn call(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Value, Revert> {
        match method {
            "interfaceHash" => Ok(json!(interface_hash(&args.string(0)?))),

            "getManager" => {
                ctx.charge(costs::REGISTRY_LOOKUP)?;
                Ok(json!(self.get_manager(&args.address(0)?)))
            }

            "setManager" => {
                let address = args.address(0)?;
                let new_manager = args.address(1)?;
                ctx.charge(costs::STORAGE_WRITE_NEW)?;
                self.set_manager(ctx.caller, address, new_manager)?;
                ctx.emit(
                    "ManagerChanged",
                    json!({ "addr": address, "newManager": new_manager }),
                )?;
                Ok(Value::Bool(true))
            }

            "getInterfaceImplementer" => {
                let address = args.address(0)?;
                let iface = interface_hash(&args.string(1)?);
                ctx.charge(costs::REGISTRY_LOOKUP)?;
                Ok(json!(self.get_interface_implementer(&address, &iface)))
            }

            "setInterfaceImplementer" => {
                let address = args.address(0)?;
                let name = args.string(1)?;
                let implementer = args.address(2)?;
                ctx.charge(costs::STORAGE_WRITE_NEW)?;
                self.set_interface_implementer(
                    ctx.caller,
                    address,
                    interface_hash(&name),
                    implementer,
                )?;
                ctx.emit(
                    "InterfaceImplementerSet",
                    json!({ "addr": address, "interface": name, "implementer": implementer }),
                )?;
                Ok(Value::Bool(true))
            }

            other => Err(Revert::UnknownMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_self_managed_by_default() {
        let registry = InterfaceRegistry::new();
        assert_eq!(registry.get_manager(&addr(1)), addr(1));
    }

    #[test]
    fn test_only_manager_sets_implementer() {
        let mut registry = InterfaceRegistry::new();
        let iface = interface_hash("ITokenRecipient");

        let err = registry
            .set_interface_implementer(addr(2), addr(1), iface, addr(3))
            .unwrap_err();
        assert_eq!(err.kind(), "unauthorized");

        registry
            .set_interface_implementer(addr(1), addr(1), iface, addr(3))
            .unwrap();
        assert_eq!(registry.get_interface_implementer(&addr(1), &iface), addr(3));
        assert_eq!(
            registry.get_interface_implementer(&addr(1), &interface_hash("Ierc20")),
            Address::ZERO
        );
    }

    #[test]
    fn test_delegated_manager() {
        let mut registry = InterfaceRegistry::new();
        let iface = interface_hash("Ierc777");

        registry.set_manager(addr(1), addr(1), addr(9)).unwrap();
        assert_eq!(registry.get_manager(&addr(1)), addr(9));
        assert!(registry
            .set_interface_implementer(addr(1), addr(1), iface, addr(4))
            .is_err());
        registry
            .set_interface_implementer(addr(9), addr(1), iface, addr(4))
            .unwrap();

        // handing management back to the address itself clears the delegation
        registry.set_manager(addr(9), addr(1), addr(1)).unwrap();
        assert_eq!(registry.get_manager(&addr(1)), addr(1));
    }

    #[test]
    fn test_clearing_implementer() {
        let mut registry = InterfaceRegistry::new();
        let iface = interface_hash("Ierc20");
        registry
            .set_interface_implementer(addr(1), addr(1), iface, addr(5))
            .unwrap();
        registry
            .set_interface_implementer(addr(1), addr(1), iface, Address::ZERO)
            .unwrap();
        assert!(registry.get_interface_implementer(&addr(1), &iface).is_zero());
    }
}
