// ============================================================================
// Pool Factory
// ============================================================================

use super::{FixedProductMarketMaker, MarketMakerError};
use crate::collateral::TokenBank;
use crate::event_log::EventLog;
use crate::positions::{derive_address, ConditionalTokens};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FactoryEvent {
    FixedProductMarketMakerCreation {
        creator: Address,
        fixed_product_market_maker: Address,
        conditional_tokens: Address,
        collateral_token: Address,
        condition_ids: Vec<B256>,
        fee: U256,
        treasury_percent: u64,
        treasury: Address,
    },
}

/// Deploys pools at deterministic addresses and owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedProductMarketMakerFactory {
    pub address: Address,
    nonce: u64,
    pools: BTreeMap<Address, FixedProductMarketMaker>,
    events: EventLog<FactoryEvent>,
}

impl FixedProductMarketMakerFactory {
    pub fn new(address: Address) -> Self {
        Self { address, nonce: 0, pools: BTreeMap::new(), events: EventLog::new() }
    }

    /// Address the next pool will be deployed at.
    pub fn next_pool_address(&self) -> Address {
        derive_address(self.address.as_slice(), self.nonce)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_fixed_product_market_maker(
        &mut self,
        ledger: &ConditionalTokens,
        bank: &TokenBank,
        creator: Address,
        collateral: Address,
        condition_ids: Vec<B256>,
        fee: U256,
        treasury_percent: u64,
        treasury: Address,
    ) -> Result<Address, MarketMakerError> {
        if !bank.is_registered(&collateral) {
            return Err(MarketMakerError::precondition(format!(
                "unknown collateral asset {}",
                collateral
            )));
        }
        let address = self.next_pool_address();
        let pool = FixedProductMarketMaker::new(
            address,
            creator,
            ledger,
            collateral,
            condition_ids.clone(),
            fee,
            treasury_percent,
            treasury,
        )?;

        self.nonce += 1;
        self.pools.insert(address, pool);
        self.events.push(FactoryEvent::FixedProductMarketMakerCreation {
            creator,
            fixed_product_market_maker: address,
            conditional_tokens: ledger.address,
            collateral_token: collateral,
            condition_ids,
            fee,
            treasury_percent,
            treasury,
        });
        info!("🏭 Pool {} created by {} for collateral {}", address, creator, collateral);
        Ok(address)
    }

    pub fn pool(&self, address: &Address) -> Option<&FixedProductMarketMaker> {
        self.pools.get(address)
    }

    pub fn pool_mut(&mut self, address: &Address) -> Option<&mut FixedProductMarketMaker> {
        self.pools.get_mut(address)
    }

    pub fn pools(&self) -> impl Iterator<Item = &FixedProductMarketMaker> {
        self.pools.values()
    }

    pub(crate) fn pools_mut(&mut self) -> impl Iterator<Item = &mut FixedProductMarketMaker> {
        self.pools.values_mut()
    }

    pub fn events(&self) -> &[FactoryEvent] {
        self.events.as_slice()
    }

    pub(crate) fn event_log_mut(&mut self) -> &mut EventLog<FactoryEvent> {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_maker::ONE;

    #[test]
    fn test_create_pool_emits_creation_event() {
        let mut ledger = ConditionalTokens::new(Address::repeat_byte(0xc7));
        let mut bank = TokenBank::new();
        let weth = Address::repeat_byte(0xee);
        bank.register(weth, "WETH").unwrap();
        let cond = ledger
            .prepare_condition(Address::repeat_byte(0x0a), B256::repeat_byte(1), 3)
            .unwrap();

        let mut factory = FixedProductMarketMakerFactory::new(Address::repeat_byte(0xfa));
        let expected = factory.next_pool_address();
        let fee = ONE * U256::from(3u8) / U256::from(1000u64);
        let address = factory
            .create_fixed_product_market_maker(
                &ledger,
                &bank,
                Address::repeat_byte(0xc0),
                weth,
                vec![cond],
                fee,
                100,
                Address::repeat_byte(0x7e),
            )
            .unwrap();

        assert_eq!(address, expected);
        assert_ne!(factory.next_pool_address(), address);
        assert_eq!(factory.pool(&address).unwrap().outcome_count(), 3);
        assert_eq!(
            factory.events()[0],
            FactoryEvent::FixedProductMarketMakerCreation {
                creator: Address::repeat_byte(0xc0),
                fixed_product_market_maker: address,
                conditional_tokens: ledger.address,
                collateral_token: weth,
                condition_ids: vec![cond],
                fee,
                treasury_percent: 100,
                treasury: Address::repeat_byte(0x7e),
            }
        );
    }

    #[test]
    fn test_create_pool_rejects_unknown_collateral() {
        let ledger = ConditionalTokens::new(Address::repeat_byte(0xc7));
        let bank = TokenBank::new();
        let mut factory = FixedProductMarketMakerFactory::new(Address::repeat_byte(0xfa));
        let before = factory.next_pool_address();
        assert!(factory
            .create_fixed_product_market_maker(
                &ledger,
                &bank,
                Address::ZERO,
                Address::repeat_byte(0xee),
                vec![],
                U256::ZERO,
                0,
                Address::ZERO,
            )
            .is_err());
        assert_eq!(factory.next_pool_address(), before);
    }
}
