// ReferenceToken - EIP-777 style token with ERC-20 compatibility
//
// Invariants:
// - total_supply == sum of balances
// - every balance and every movement is a multiple of granularity
// - contract recipients must register an ITokenRecipient implementer

use super::abi::{amount_value, Args};
use super::registry::interface_hash;
use super::{CallContext, Revert};
use crate::execution::gas::costs;
use crate::types::{Address, Balance, UNIT};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DECIMALS: u8 = 18;

pub const IERC777: &str = "Ierc777";
pub const IERC20: &str = "Ierc20";
pub const ITOKEN_RECIPIENT: &str = "ITokenRecipient";

#[derive(Debug, Clone)]
pub struct ReferenceToken {
    name: String,
    symbol: String,
    granularity: Balance,
    registry: Address,
    owner: Address,
    total_supply: Balance,
    balances: BTreeMap<Address, Balance>,
    /// (holder, operator)
    operators: BTreeSet<(Address, Address)>,
    /// (owner, spender) -> allowance
    allowances: BTreeMap<(Address, Address), Balance>,
}

impl ReferenceToken {
    pub const KIND: &'static str = "ReferenceToken";

    /// Constructor: owner is the deployer
    pub fn deploy(
        ctx: &mut CallContext<'_>,
        name: &str,
        symbol: &str,
        granularity: Balance,
        registry: Address,
    ) -> Result<Self, Revert> {
        if granularity == 0 || UNIT % granularity != 0 {
            return Err(Revert::InvalidGranularity(granularity));
        }

        ctx.charge(costs::STORAGE_WRITE_NEW * 5)?;

        let this = ctx.this;
        for iface in [IERC777, IERC20] {
            ctx.charge(costs::REGISTRY_LOOKUP + costs::STORAGE_WRITE_NEW)?;
            ctx.registry_mut(&registry)?
                .set_interface_implementer(this, this, interface_hash(iface), this)?;
        }

        debug!(token = %this, name, symbol, granularity, "token constructed");

        Ok(Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            granularity,
            registry,
            owner: ctx.caller,
            total_supply: 0,
            balances: BTreeMap::new(),
            operators: BTreeSet::new(),
            allowances: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn granularity(&self) -> Balance {
        self.granularity
    }

    pub fn total_supply(&self) -> Balance {
        self.total_supply
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn balance_of(&self, holder: &Address) -> Balance {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// A holder is always its own operator
    pub fn is_operator_for(&self, operator: &Address, holder: &Address) -> bool {
        operator == holder || self.operators.contains(&(*holder, *operator))
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Balance {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn require_multiple(&self, amount: Balance) -> Result<(), Revert> {
        if amount % self.granularity != 0 {
            return Err(Revert::NotMultipleOfGranularity {
                amount,
                granularity: self.granularity,
            });
        }
        Ok(())
    }

    fn write_cost(&self, holder: &Address) -> u64 {
        if self.balances.contains_key(holder) {
            costs::STORAGE_WRITE_EXISTING
        } else {
            costs::STORAGE_WRITE_NEW
        }
    }

    /// Contracts must have registered an ITokenRecipient implementer
    fn require_recipient(&self, ctx: &mut CallContext<'_>, to: &Address) -> Result<(), Revert> {
        if !ctx.is_contract(to) {
            return Ok(());
        }
        ctx.charge(costs::REGISTRY_LOOKUP)?;
        let implementer = ctx
            .registry(&self.registry)?
            .get_interface_implementer(to, &interface_hash(ITOKEN_RECIPIENT));
        if implementer.is_zero() {
            return Err(Revert::RecipientNotRegistered(*to));
        }
        Ok(())
    }

    fn mint(
        &mut self,
        ctx: &mut CallContext<'_>,
        to: Address,
        amount: Balance,
        operator_data: &[u8],
    ) -> Result<(), Revert> {
        if ctx.caller != self.owner {
            return Err(Revert::Unauthorized(format!(
                "{} is not the token owner",
                ctx.caller
            )));
        }
        self.require_multiple(amount)?;
        if to.is_zero() {
            return Err(Revert::ZeroAddress);
        }
        self.require_recipient(ctx, &to)?;

        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(Revert::InvalidOperation)?;
        ctx.charge(self.write_cost(&to) + costs::STORAGE_WRITE_EXISTING)?;

        self.total_supply = supply;
        *self.balances.entry(to).or_insert(0) += amount;

        ctx.emit(
            "Minted",
            json!({
                "operator": ctx.caller,
                "to": to,
                "amount": amount_value(amount),
                "operatorData": format!("0x{}", hex::encode(operator_data)),
            }),
        )?;
        Ok(())
    }

    fn do_send(
        &mut self,
        ctx: &mut CallContext<'_>,
        from: Address,
        to: Address,
        amount: Balance,
        user_data: &[u8],
        operator_data: &[u8],
    ) -> Result<(), Revert> {
        self.require_multiple(amount)?;
        if to.is_zero() {
            return Err(Revert::ZeroAddress);
        }

        ctx.charge(costs::STORAGE_READ)?;
        let available = self.balance_of(&from);
        if available < amount {
            return Err(Revert::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.require_recipient(ctx, &to)?;

        ctx.charge(costs::STORAGE_WRITE_EXISTING + self.write_cost(&to))?;
        *self.balances.entry(from).or_insert(0) -= amount;
        *self.balances.entry(to).or_insert(0) += amount;

        ctx.emit(
            "Sent",
            json!({
                "operator": ctx.caller,
                "from": from,
                "to": to,
                "amount": amount_value(amount),
                "userData": format!("0x{}", hex::encode(user_data)),
                "operatorData": format!("0x{}", hex::encode(operator_data)),
            }),
        )?;
        Ok(())
    }

    fn burn(&mut self, ctx: &mut CallContext<'_>, amount: Balance, holder_data: &[u8]) -> Result<(), Revert> {
        self.require_multiple(amount)?;
        let holder = ctx.caller;

        ctx.charge(costs::STORAGE_READ)?;
        let available = self.balance_of(&holder);
        if available < amount {
            return Err(Revert::InsufficientBalance {
                needed: amount,
                available,
            });
        }

        ctx.charge(costs::STORAGE_WRITE_EXISTING * 2)?;
        *self.balances.entry(holder).or_insert(0) -= amount;
        self.total_supply -= amount;

        ctx.emit(
            "Burned",
            json!({
                "from": holder,
                "amount": amount_value(amount),
                "holderData": format!("0x{}", hex::encode(holder_data)),
            }),
        )?;
        Ok(())
    }

    fn set_operator(
        &mut self,
        ctx: &mut CallContext<'_>,
        operator: Address,
        authorized: bool,
    ) -> Result<(), Revert> {
        let holder = ctx.caller;
        if operator == holder {
            return Err(Revert::BadArgument(
                "a holder is always its own operator".to_string(),
            ));
        }

        ctx.charge(costs::STORAGE_WRITE_NEW)?;
        let event = if authorized {
            self.operators.insert((holder, operator));
            "AuthorizedOperator"
        } else {
            self.operators.remove(&(holder, operator));
            "RevokedOperator"
        };
        ctx.emit(event, json!({ "operator": operator, "holder": holder }))
    }

    pub(crate) fn call(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Value, Revert> {
        match method {
            // Views
            "name" => Ok(json!(self.name)),
            "symbol" => Ok(json!(self.symbol)),
            "decimals" => Ok(json!(DECIMALS)),
            "granularity" => Ok(amount_value(self.granularity)),
            "owner" => Ok(json!(self.owner)),
            "totalSupply" => {
                ctx.charge(costs::STORAGE_READ)?;
                Ok(amount_value(self.total_supply))
            }
            "balanceOf" => {
                let holder = args.address(0)?;
                ctx.charge(costs::STORAGE_READ)?;
                Ok(amount_value(self.balance_of(&holder)))
            }
            "isOperatorFor" => {
                let operator = args.address(0)?;
                let holder = args.address(1)?;
                ctx.charge(costs::STORAGE_READ)?;
                Ok(json!(self.is_operator_for(&operator, &holder)))
            }
            "allowance" => {
                let owner = args.address(0)?;
                let spender = args.address(1)?;
                ctx.charge(costs::STORAGE_READ)?;
                Ok(amount_value(self.allowance(&owner, &spender)))
            }

            // EIP-777
            "ownerMint" => {
                let to = args.address(0)?;
                let amount = args.amount(1)?;
                let operator_data = args.bytes(2)?;
                self.mint(ctx, to, amount, &operator_data)?;
                Ok(Value::Null)
            }
            "send" => {
                let to = args.address(0)?;
                let amount = args.amount(1)?;
                let user_data = args.bytes(2)?;
                let from = ctx.caller;
                self.do_send(ctx, from, to, amount, &user_data, &[])?;
                Ok(Value::Null)
            }
            "operatorSend" => {
                let from = args.address(0)?;
                let to = args.address(1)?;
                let amount = args.amount(2)?;
                let user_data = args.bytes(3)?;
                let operator_data = args.bytes(4)?;
                if !self.is_operator_for(&ctx.caller, &from) {
                    return Err(Revert::Unauthorized(format!(
                        "{} is not an operator for {}",
                        ctx.caller, from
                    )));
                }
                self.do_send(ctx, from, to, amount, &user_data, &operator_data)?;
                Ok(Value::Null)
            }
            "burn" => {
                let amount = args.amount(0)?;
                let holder_data = args.bytes(1)?;
                self.burn(ctx, amount, &holder_data)?;
                Ok(Value::Null)
            }
            "authorizeOperator" => {
                self.set_operator(ctx, args.address(0)?, true)?;
                Ok(Value::Null)
            }
            "revokeOperator" => {
                self.set_operator(ctx, args.address(0)?, false)?;
                Ok(Value::Null)
            }

            // ERC-20
            "transfer" => {
                let to = args.address(0)?;
                let amount = args.amount(1)?;
                let from = ctx.caller;
                self.do_send(ctx, from, to, amount, &[], &[])?;
                Ok(Value::Bool(true))
            }
            "approve" => {
                let spender = args.address(0)?;
                let amount = args.amount(1)?;
                self.require_multiple(amount)?;
                ctx.charge(costs::STORAGE_WRITE_NEW)?;
                let owner = ctx.caller;
                self.allowances.insert((owner, spender), amount);
                ctx.emit(
                    "Approval",
                    json!({ "owner": owner, "spender": spender, "amount": amount_value(amount) }),
                )?;
                Ok(Value::Bool(true))
            }
            "transferFrom" => {
                let from = args.address(0)?;
                let to = args.address(1)?;
                let amount = args.amount(2)?;
                let spender = ctx.caller;

                ctx.charge(costs::STORAGE_READ)?;
                let allowed = self.allowance(&from, &spender);
                if allowed < amount {
                    return Err(Revert::InsufficientAllowance {
                        needed: amount,
                        allowed,
                    });
                }
                self.do_send(ctx, from, to, amount, &[], &[])?;
                ctx.charge(costs::STORAGE_WRITE_EXISTING)?;
                self.allowances.insert((from, spender), allowed - amount);
                Ok(Value::Bool(true))
            }

            other => Err(Revert::UnknownMethod(other.to_string())),
        }
    }
}
