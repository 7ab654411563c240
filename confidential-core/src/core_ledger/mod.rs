//! Minimal transaction view
//!
//! Just enough of a transaction to find the parties it references: states
//! carry participant lists, commands carry signer keys.

use crate::core_identity::{AbstractParty, AnonymousParty, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A contract state and its participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub participants: Vec<AbstractParty>,
}

impl ContractState {
    pub fn new(participants: impl IntoIterator<Item = AbstractParty>) -> Self {
        ContractState {
            participants: participants.into_iter().collect(),
        }
    }
}

/// A command and the keys required to sign it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub signers: Vec<PublicKey>,
}

impl Command {
    pub fn new(signers: impl IntoIterator<Item = PublicKey>) -> Self {
        Command {
            signers: signers.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub inputs: Vec<ContractState>,
    pub outputs: Vec<ContractState>,
    pub commands: Vec<Command>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            id: Uuid::new_v4(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn with_input(mut self, state: ContractState) -> Self {
        self.inputs.push(state);
        self
    }

    pub fn with_output(mut self, state: ContractState) -> Self {
        self.outputs.push(state);
        self
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Keys of every party the transaction touches
    ///
    /// Anonymous participants of inputs then outputs, then command signers,
    /// each key once in first-seen order. Well-known participants are skipped.
    pub fn referenced_keys(&self) -> Vec<PublicKey> {
        let participants = self
            .inputs
            .iter()
            .chain(&self.outputs)
            .flat_map(|state| &state.participants)
            .filter_map(AbstractParty::as_anonymous)
            .map(|anon| *anon.owning_key());
        let signers = self.commands.iter().flat_map(|cmd| cmd.signers.iter().copied());

        let mut seen = HashSet::new();
        participants
            .chain(signers)
            .filter(|key| seen.insert(*key))
            .collect()
    }

    /// [`Self::referenced_keys`] as anonymous parties
    pub fn referenced_parties(&self) -> Vec<AnonymousParty> {
        self.referenced_keys()
            .into_iter()
            .map(AnonymousParty::new)
            .collect()
    }
}
