//! # In-Memory Store
//!
//! `ContractStore` and `ReceiptStore` backed by maps behind a tokio `RwLock`.
//! Used by the development server and by tests.

use crate::contract::{Client, Contract, ContractUpdate, Pet, Plan};
use crate::error::{PaymentError, PaymentResult};
use crate::ports::{ContractStore, ReceiptStore};
use crate::receipt::PaymentReceipt;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    contracts: HashMap<String, Contract>,
    clients: HashMap<String, Client>,
    plans: HashMap<String, Plan>,
    pets: HashMap<String, Pet>,
    /// Keyed by gateway payment id (unique)
    receipts: HashMap<String, PaymentReceipt>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a contract. Rejects a second contract claiming a
    /// payment id that another contract already holds.
    pub async fn put_contract(&self, contract: Contract) -> PaymentResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(payment_id) = &contract.cielo_payment_id {
            let taken = tables.contracts.values().any(|c| {
                c.id != contract.id && c.cielo_payment_id.as_deref() == Some(payment_id)
            });
            if taken {
                return Err(PaymentError::Storage(format!(
                    "payment id {} already belongs to another contract",
                    payment_id
                )));
            }
        }
        tables.contracts.insert(contract.id.clone(), contract);
        Ok(())
    }

    pub async fn put_client(&self, client: Client) {
        self.tables
            .write()
            .await
            .clients
            .insert(client.id.clone(), client);
    }

    pub async fn put_plan(&self, plan: Plan) {
        self.tables.write().await.plans.insert(plan.id.clone(), plan);
    }

    pub async fn put_pet(&self, pet: Pet) {
        self.tables.write().await.pets.insert(pet.id.clone(), pet);
    }

    pub async fn contract(&self, id: &str) -> Option<Contract> {
        self.tables.read().await.contracts.get(id).cloned()
    }

    pub async fn receipt_count(&self) -> usize {
        self.tables.read().await.receipts.len()
    }
}

#[async_trait]
impl ContractStore for InMemoryStore {
    async fn get_contract_by_external_payment_id(
        &self,
        payment_id: &str,
    ) -> PaymentResult<Option<Contract>> {
        Ok(self
            .tables
            .read()
            .await
            .contracts
            .values()
            .find(|c| c.cielo_payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn update_contract(&self, id: &str, update: &ContractUpdate) -> PaymentResult<Contract> {
        let mut tables = self.tables.write().await;
        let contract = tables
            .contracts
            .get_mut(id)
            .ok_or_else(|| PaymentError::Storage(format!("contract {} does not exist", id)))?;
        contract.apply(update);
        Ok(contract.clone())
    }

    async fn get_client_by_id(&self, id: &str) -> PaymentResult<Option<Client>> {
        Ok(self.tables.read().await.clients.get(id).cloned())
    }

    async fn get_plan(&self, id: &str) -> PaymentResult<Option<Plan>> {
        Ok(self.tables.read().await.plans.get(id).cloned())
    }

    async fn get_pet(&self, id: &str) -> PaymentResult<Option<Pet>> {
        Ok(self.tables.read().await.pets.get(id).cloned())
    }

    async fn get_all_contracts(&self) -> PaymentResult<Vec<Contract>> {
        Ok(self.tables.read().await.contracts.values().cloned().collect())
    }

    async fn get_all_clients(&self) -> PaymentResult<Vec<Client>> {
        let mut clients: Vec<Client> = self.tables.read().await.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clients)
    }
}

#[async_trait]
impl ReceiptStore for InMemoryStore {
    async fn get_receipt_by_payment_id(
        &self,
        payment_id: &str,
    ) -> PaymentResult<Option<PaymentReceipt>> {
        Ok(self.tables.read().await.receipts.get(payment_id).cloned())
    }

    async fn insert_receipt(&self, receipt: PaymentReceipt) -> PaymentResult<PaymentReceipt> {
        let mut tables = self.tables.write().await;
        if tables.receipts.contains_key(&receipt.cielo_payment_id) {
            return Err(PaymentError::DuplicateReceipt {
                payment_id: receipt.cielo_payment_id,
            });
        }
        tables
            .receipts
            .insert(receipt.cielo_payment_id.clone(), receipt.clone());
        Ok(receipt)
    }
}
