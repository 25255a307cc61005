//! Tax normalization and transaction resolution
//!
//! Taxes are percentages attached to postings through `tax:` metadata or
//! tags. Resolution injects one synthesized posting per tax and then
//! balances every transaction so its postings sum to zero per commodity.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use ledgerlens_config::{TaxDefinition, TaxDefinitionMap, TaxEntry};
use ledgerlens_parser::{Amount, Meta, Posting, Price, RootNames, Transaction};

use crate::error::{ImbalanceError, TaxConfigError};
use crate::options::AnalysisOptions;

// ==================== Normalization ====================

/// Where the tax map of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxSource {
    Caller,
    Metadata,
    Default,
    None,
}

/// Outcome of reading `taxes` from the ledger metadata
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataTaxes {
    Absent,
    Valid(TaxDefinitionMap),
    Invalid(TaxConfigError),
}

/// Tax map chosen for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxNormalization {
    pub taxes: TaxDefinitionMap,
    pub source: TaxSource,
    /// Why the metadata taxes were discarded, if they were
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaxConfigError>,
}

/// Read the `taxes` key of a metadata mapping
pub fn metadata_taxes(metadata: &serde_yaml::Value) -> MetadataTaxes {
    let raw = match metadata.get("taxes") {
        None | Some(serde_yaml::Value::Null) => return MetadataTaxes::Absent,
        Some(raw) => raw,
    };
    let mapping = match raw.as_mapping() {
        Some(mapping) => mapping,
        None => return MetadataTaxes::Invalid(TaxConfigError::NotAMapping),
    };

    let mut taxes = TaxDefinitionMap::new();
    for (key, value) in mapping {
        let name = match key.as_str() {
            Some(name) => name.to_string(),
            None => return MetadataTaxes::Invalid(TaxConfigError::NotAMapping),
        };
        let entry: TaxEntry = match serde_yaml::from_value(value.clone()) {
            Ok(entry) => entry,
            Err(_) => return MetadataTaxes::Invalid(TaxConfigError::InvalidEntry { name }),
        };
        match TaxDefinition::new(&name, entry.percentage()) {
            Ok(definition) => {
                taxes.insert(name, definition);
            }
            Err(_) => {
                return MetadataTaxes::Invalid(TaxConfigError::OutOfRange {
                    name,
                    percentage: entry.percentage(),
                })
            }
        }
    }
    MetadataTaxes::Valid(taxes)
}

/// Choose the tax map: caller override, then metadata, then the configured default
pub fn normalize_taxes(metadata: Option<&serde_yaml::Value>, options: &AnalysisOptions) -> TaxNormalization {
    let from_metadata = metadata.map(metadata_taxes).unwrap_or(MetadataTaxes::Absent);

    let error = match &from_metadata {
        MetadataTaxes::Invalid(error) => {
            log::warn!(target: "ledgerlens::taxes", "Discarding metadata taxes: {}", error);
            Some(error.clone())
        }
        _ => None,
    };

    let fallback = || {
        if options.default_taxes.is_empty() {
            (TaxDefinitionMap::new(), TaxSource::None)
        } else {
            (options.default_taxes.clone(), TaxSource::Default)
        }
    };

    let (taxes, source) = match (&options.taxes, from_metadata) {
        (Some(caller), _) => (caller.clone(), TaxSource::Caller),
        (None, MetadataTaxes::Valid(taxes)) => (taxes, TaxSource::Metadata),
        (None, _) => fallback(),
    };

    log::debug!(target: "ledgerlens::taxes", "Using {} taxes from {:?}", taxes.len(), source);
    TaxNormalization { taxes, source, error }
}

// ==================== Resolved Transactions ====================

/// Posting with a concrete amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPosting {
    pub account: String,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// Injected by tax resolution
    pub synthesized: bool,
    /// Tax this posting was synthesized for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<String>,
    pub tags: Vec<String>,
    pub meta: Meta,
}

impl ResolvedPosting {
    fn from_posting(posting: &Posting, amount: Amount) -> Self {
        Self {
            account: posting.account.clone(),
            amount,
            price: posting.price.clone(),
            synthesized: false,
            tax: None,
            tags: posting.tags.clone(),
            meta: posting.meta.clone(),
        }
    }

    /// Amount counted towards the balance; priced postings weigh in the price commodity
    pub fn weight(&self) -> Result<Amount, ImbalanceError> {
        match &self.price {
            None => Ok(self.amount.clone()),
            Some(Price::Single(unit)) => self
                .amount
                .quantity
                .checked_mul(unit.quantity)
                .map(|quantity| Amount::new(quantity, unit.commodity.clone()))
                .ok_or_else(|| ImbalanceError::Overflow { commodity: unit.commodity.clone() }),
            Some(Price::Total(total)) => {
                let quantity = if self.amount.quantity.is_sign_negative() {
                    -total.quantity.abs()
                } else {
                    total.quantity.abs()
                };
                Ok(Amount::new(quantity, total.commodity.clone()))
            }
        }
    }
}

/// Add `quantity` to the running total of `commodity`
fn accumulate(sums: &mut BTreeMap<String, Decimal>, commodity: &str, quantity: Decimal) -> Result<(), ImbalanceError> {
    let total = sums.entry(commodity.to_string()).or_insert(Decimal::ZERO);
    *total = total
        .checked_add(quantity)
        .ok_or_else(|| ImbalanceError::Overflow { commodity: commodity.to_string() })?;
    Ok(())
}

/// Transaction whose postings all carry amounts and sum to zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTransaction {
    pub date: NaiveDate,
    pub flag: Option<String>,
    pub code: Option<String>,
    pub description: String,
    pub postings: Vec<ResolvedPosting>,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub line: usize,
}

impl ResolvedTransaction {
    /// Sum of posting weights per commodity
    pub fn sums(&self) -> Result<BTreeMap<String, Decimal>, ImbalanceError> {
        let mut sums = BTreeMap::new();
        for posting in &self.postings {
            let weight = posting.weight()?;
            accumulate(&mut sums, &weight.commodity, weight.quantity)?;
        }
        Ok(sums)
    }

    pub fn is_balanced(&self) -> bool {
        self.sums().is_ok_and(|sums| sums.values().all(Decimal::is_zero))
    }
}

/// Transaction left out of the resolved set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedTransaction {
    pub line: usize,
    pub date: NaiveDate,
    pub description: String,
    pub error: ImbalanceError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSet {
    pub transactions: Vec<ResolvedTransaction>,
    pub rejected: Vec<RejectedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaxResolution {
    /// No usable tax map; the input is returned untouched
    Skipped { transactions: Vec<Transaction>, reason: String },
    Resolved(ResolvedSet),
}

// ==================== Resolution ====================

/// Ledger-specific inputs of resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveSettings {
    /// Tax postings are booked to `<prefix>:<NAME>`
    pub tax_account_prefix: String,
    /// Declared accounts, when undeclared ones must be rejected
    pub declared_accounts: Option<BTreeSet<String>>,
}

impl ResolveSettings {
    pub fn new(options: &AnalysisOptions, parents: &RootNames, declared: &[String]) -> Self {
        let tax_account_prefix = options
            .tax_account_prefix
            .clone()
            .unwrap_or_else(|| format!("{}:Taxes", parents.liabilities));
        let declared_accounts = (options.strict_accounts && !declared.is_empty())
            .then(|| declared.iter().cloned().collect());
        Self { tax_account_prefix, declared_accounts }
    }
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            tax_account_prefix: "Liabilities:Taxes".to_string(),
            declared_accounts: None,
        }
    }
}

/// Inject tax postings and balance every transaction.
///
/// With an empty tax map nothing is resolved and the input is handed back.
pub fn resolve(transactions: &[Transaction], taxes: &TaxDefinitionMap, settings: &ResolveSettings) -> TaxResolution {
    if taxes.is_empty() {
        log::info!(target: "ledgerlens::taxes", "Skipped resolve: no tax definitions");
        return TaxResolution::Skipped {
            transactions: transactions.to_vec(),
            reason: "no tax definitions available".to_string(),
        };
    }
    TaxResolution::Resolved(resolve_all(transactions, taxes, settings))
}

/// Balance every transaction without injecting taxes
pub fn balance_only(transactions: &[Transaction], settings: &ResolveSettings) -> ResolvedSet {
    resolve_all(transactions, &TaxDefinitionMap::new(), settings)
}

fn resolve_all(transactions: &[Transaction], taxes: &TaxDefinitionMap, settings: &ResolveSettings) -> ResolvedSet {
    let mut set = ResolvedSet::default();
    for txn in transactions {
        match resolve_transaction(txn, taxes, settings) {
            Ok(resolved) => set.transactions.push(resolved),
            Err(error) => {
                log::warn!(target: "ledgerlens::taxes", "Rejected transaction at line {}: {}", txn.line, error);
                set.rejected.push(RejectedTransaction {
                    line: txn.line,
                    date: txn.date,
                    description: txn.description.clone(),
                    error,
                });
            }
        }
    }
    log::debug!(
        target: "ledgerlens::taxes",
        "Resolved {} transactions, rejected {}",
        set.transactions.len(),
        set.rejected.len()
    );
    set
}

/// Tax names of `posting` that have a definition
fn known_taxes<'a>(posting: &Posting, taxes: &'a TaxDefinitionMap) -> Vec<(String, &'a TaxDefinition)> {
    posting
        .tax_names()
        .into_iter()
        .filter_map(|name| taxes.get(&name).map(|definition| (name, definition)))
        .collect()
}

fn resolve_transaction(
    txn: &Transaction,
    taxes: &TaxDefinitionMap,
    settings: &ResolveSettings,
) -> Result<ResolvedTransaction, ImbalanceError> {
    if let Some(declared) = &settings.declared_accounts {
        if let Some(orphan) = txn.postings.iter().find(|p| !declared.contains(&p.account)) {
            return Err(ImbalanceError::UndeclaredAccount { account: orphan.account.clone() });
        }
    }

    let elided = txn.elided_count();
    if elided == txn.postings.len() {
        return Err(ImbalanceError::NoAmounts);
    }
    if elided > 1 {
        return Err(ImbalanceError::MultipleElided { count: elided });
    }

    // Postings in input order; `None` marks the elided one
    let mut postings: Vec<Option<ResolvedPosting>> = Vec::new();
    let mut pre_tax: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut tax_residual: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut absorbers: Vec<usize> = Vec::new();

    for posting in &txn.postings {
        let amount = match &posting.amount {
            Some(amount) => amount.clone(),
            None => {
                postings.push(None);
                continue;
            }
        };

        let base = ResolvedPosting::from_posting(posting, amount);
        let weight = base.weight()?;
        accumulate(&mut pre_tax, &weight.commodity, weight.quantity)?;

        let applicable = known_taxes(posting, taxes);
        if applicable.is_empty() && base.price.is_none() {
            absorbers.push(postings.len());
        }
        postings.push(Some(base));

        for (name, definition) in applicable {
            let quantity = weight
                .quantity
                .checked_mul(definition.percentage)
                .ok_or_else(|| ImbalanceError::Overflow { commodity: weight.commodity.clone() })?;
            if quantity.is_zero() {
                continue;
            }
            accumulate(&mut tax_residual, &weight.commodity, quantity)?;
            postings.push(Some(ResolvedPosting {
                account: format!("{}:{}", settings.tax_account_prefix, name),
                amount: Amount::new(quantity, weight.commodity.clone()),
                price: None,
                synthesized: true,
                tax: Some(name),
                tags: Vec::new(),
                meta: Meta::default(),
            }));
        }
    }

    let mut resolved: Vec<ResolvedPosting> = Vec::with_capacity(postings.len() + 1);

    if elided == 1 {
        let mut residual = pre_tax.clone();
        for (commodity, quantity) in &tax_residual {
            accumulate(&mut residual, commodity, *quantity)?;
        }
        let elided_posting = txn
            .postings
            .iter()
            .find(|p| p.amount.is_none())
            .ok_or(ImbalanceError::NoAmounts)?;

        let mut inferred: Vec<Amount> = residual
            .into_iter()
            .filter(|(_, quantity)| !quantity.is_zero())
            .map(|(commodity, quantity)| Amount::new(-quantity, commodity))
            .collect();
        if inferred.is_empty() {
            let commodity = pre_tax.keys().next().cloned().unwrap_or_default();
            inferred.push(Amount::zero(commodity));
        }

        for slot in postings {
            match slot {
                Some(posting) => resolved.push(posting),
                None => {
                    // One posting per commodity left to balance
                    for amount in inferred.drain(..) {
                        resolved.push(ResolvedPosting::from_posting(elided_posting, amount));
                    }
                }
            }
        }
    } else {
        if let Some((commodity, quantity)) = pre_tax.iter().find(|(_, quantity)| !quantity.is_zero()) {
            return Err(ImbalanceError::Unbalanced { commodity: commodity.clone(), residual: *quantity });
        }

        let mut slots: Vec<ResolvedPosting> = postings.into_iter().flatten().collect();
        for (commodity, quantity) in tax_residual.iter().filter(|(_, quantity)| !quantity.is_zero()) {
            let absorber = absorbers.iter().rev().copied().find(|&i| {
                let amount = &slots[i].amount;
                amount.commodity == *commodity
                    && !amount.quantity.is_zero()
                    && amount.quantity.is_sign_negative() != quantity.is_sign_negative()
            });
            match absorber {
                Some(i) => {
                    let absorbed = slots[i]
                        .amount
                        .quantity
                        .checked_sub(*quantity)
                        .ok_or_else(|| ImbalanceError::Overflow { commodity: commodity.clone() })?;
                    slots[i].amount.quantity = absorbed;
                }
                None => {
                    return Err(ImbalanceError::NoBalancingPosting {
                        commodity: commodity.clone(),
                        residual: *quantity,
                    })
                }
            }
        }
        resolved = slots;
    }

    let resolved = ResolvedTransaction {
        date: txn.date,
        flag: txn.flag.clone(),
        code: txn.code.clone(),
        description: txn.description.clone(),
        postings: resolved,
        tags: txn.tags.clone(),
        meta: txn.meta.clone(),
        line: txn.line,
    };

    match resolved.sums()?.into_iter().find(|(_, quantity)| !quantity.is_zero()) {
        Some((commodity, residual)) => Err(ImbalanceError::Unbalanced { commodity, residual }),
        None => Ok(resolved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlens_parser::LedgerParser;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn parse(text: &str) -> Vec<Transaction> {
        let output = LedgerParser::parse(text);
        assert!(output.issues.is_empty(), "{:?}", output.issues);
        output.transactions().cloned().collect()
    }

    fn iva() -> TaxDefinitionMap {
        TaxDefinitionMap::from([("IVA".to_string(), TaxDefinition { percentage: dec("0.16") })])
    }

    fn yaml(text: &str) -> serde_yaml::Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn resolved_set(resolution: TaxResolution) -> ResolvedSet {
        match resolution {
            TaxResolution::Resolved(set) => set,
            TaxResolution::Skipped { reason, .. } => panic!("resolution skipped: {}", reason),
        }
    }

    #[test]
    fn test_bare_number_normalizes_to_percentage() {
        let taxes = metadata_taxes(&yaml("taxes:\n  IVA: 0.16\n"));
        assert_eq!(taxes, MetadataTaxes::Valid(iva()));

        let detailed = metadata_taxes(&yaml("taxes:\n  IVA:\n    percentage: 0.16\n"));
        assert_eq!(detailed, MetadataTaxes::Valid(iva()));
    }

    #[test]
    fn test_invalid_metadata_taxes() {
        assert_eq!(
            metadata_taxes(&yaml("taxes:\n  IVA: bad\n")),
            MetadataTaxes::Invalid(TaxConfigError::InvalidEntry { name: "IVA".to_string() })
        );
        assert_eq!(metadata_taxes(&yaml("taxes: 0.16\n")), MetadataTaxes::Invalid(TaxConfigError::NotAMapping));
        assert!(matches!(
            metadata_taxes(&yaml("taxes:\n  IVA: 1.6\n")),
            MetadataTaxes::Invalid(TaxConfigError::OutOfRange { .. })
        ));
        assert_eq!(metadata_taxes(&yaml("title: Books\n")), MetadataTaxes::Absent);
    }

    #[test]
    fn test_quoted_percentage_invalidates_map() {
        let invalid = MetadataTaxes::Invalid(TaxConfigError::InvalidEntry { name: "IVA".to_string() });
        assert_eq!(metadata_taxes(&yaml("taxes:\n  IVA: \"0.16\"\n  ISH: 0.03\n")), invalid);
        assert_eq!(metadata_taxes(&yaml("taxes:\n  IVA:\n    percentage: \"0.16\"\n")), invalid);

        let normalized = normalize_taxes(Some(&yaml("taxes:\n  IVA: \"0.16\"\n")), &AnalysisOptions::default());
        assert_eq!(normalized.source, TaxSource::Default);
        assert!(normalized.error.is_some());
    }

    #[test]
    fn test_tax_precedence() {
        let metadata = yaml("taxes:\n  ISH: 0.03\n");

        let caller = AnalysisOptions::default().with_taxes(iva());
        let normalized = normalize_taxes(Some(&metadata), &caller);
        assert_eq!(normalized.source, TaxSource::Caller);
        assert_eq!(normalized.taxes, iva());

        let normalized = normalize_taxes(Some(&metadata), &AnalysisOptions::default());
        assert_eq!(normalized.source, TaxSource::Metadata);
        assert!(normalized.taxes.contains_key("ISH"));

        let normalized = normalize_taxes(None, &AnalysisOptions::default());
        assert_eq!(normalized.source, TaxSource::Default);
        assert_eq!(normalized.taxes.len(), 2);
    }

    #[test]
    fn test_invalid_metadata_falls_back() {
        let metadata = yaml("taxes:\n  IVA: bad\n");

        let normalized = normalize_taxes(Some(&metadata), &AnalysisOptions::default());
        assert_eq!(normalized.source, TaxSource::Default);
        assert!(normalized.error.is_some());

        let options = AnalysisOptions::default().without_default_taxes();
        let normalized = normalize_taxes(Some(&metadata), &options);
        assert_eq!(normalized.source, TaxSource::None);
        assert!(normalized.taxes.is_empty());
    }

    #[test]
    fn test_resolve_injects_tax_with_elided_posting() {
        let txns = parse(
            "2024-01-02 Transfer\n    Assets:Savings  500 MXN\n    Assets:Checking\n\n\
             2024-01-10 Supplies\n    Expenses:Office  100 MXN ; tax: IVA\n    Assets:Checking\n",
        );
        let set = resolved_set(resolve(&txns, &iva(), &ResolveSettings::default()));
        assert!(set.rejected.is_empty());
        assert_eq!(set.transactions.len(), 2);

        let transfer = &set.transactions[0];
        assert_eq!(transfer.postings.len(), 2);
        assert!(transfer.postings.iter().all(|p| !p.synthesized));

        let purchase = &set.transactions[1];
        assert!(purchase.is_balanced());
        let tax = purchase.postings.iter().find(|p| p.synthesized).unwrap();
        assert_eq!(tax.account, "Liabilities:Taxes:IVA");
        assert_eq!(tax.amount, Amount::new(dec("16"), "MXN"));
        assert_eq!(tax.tax.as_deref(), Some("IVA"));
        assert_eq!(purchase.postings.last().unwrap().amount, Amount::new(dec("-116"), "MXN"));
    }

    #[test]
    fn test_resolve_absorbs_tax_without_elided_posting() {
        let txns = parse("2024-01-10 Supplies\n    Expenses:Office  100 MXN ; :IVA:\n    Assets:Checking  -100 MXN\n");
        let set = resolved_set(resolve(&txns, &iva(), &ResolveSettings::default()));
        let txn = &set.transactions[0];
        assert!(txn.is_balanced());
        assert_eq!(txn.postings.len(), 3);
        assert_eq!(txn.postings[2].account, "Assets:Checking");
        assert_eq!(txn.postings[2].amount.quantity, dec("-116"));
    }

    #[test]
    fn test_custom_tax_prefix() {
        let txns = parse("2024-01-10 Supplies\n    Gastos:Oficina  100 MXN ; tax: IVA\n    Activos:Banco\n");
        let parents = RootNames { liabilities: "Pasivos".to_string(), ..RootNames::default() };
        let settings = ResolveSettings::new(&AnalysisOptions::default(), &parents, &[]);
        let set = resolved_set(resolve(&txns, &iva(), &settings));
        assert!(set.transactions[0].postings.iter().any(|p| p.account == "Pasivos:Taxes:IVA"));
    }

    #[test]
    fn test_imbalance_reasons() {
        let txns = parse(
            "2024-01-01 Two elided\n    Expenses:Food\n    Assets:Cash\n\n\
             2024-01-02 Off by one\n    Expenses:Food  10\n    Assets:Cash  -9\n\n\
             2024-01-03 No absorber\n    Expenses:Food  100 ; tax: IVA\n    Expenses:Misc  -100 ; tax: IVA\n\n\
             2024-01-04 Fine\n    Expenses:Food  10\n    Assets:Cash\n",
        );
        let set = resolved_set(resolve(&txns, &iva(), &ResolveSettings::default()));
        assert_eq!(set.transactions.len(), 2);
        assert_eq!(set.rejected.len(), 2);
        assert_eq!(set.rejected[0].error, ImbalanceError::MultipleElided { count: 2 });
        assert_eq!(
            set.rejected[1].error,
            ImbalanceError::Unbalanced { commodity: String::new(), residual: dec("1") }
        );
        // Opposite-sign taxes cancel out, so the third entry still balances
        assert!(set.transactions[0].is_balanced());
    }

    #[test]
    fn test_no_balancing_posting() {
        let txns = parse("2024-01-03 Paid in shares\n    Expenses:Food  100 USD ; tax: IVA\n    Assets:Broker  -5 VOO @@ 100 USD\n");
        let set = resolved_set(resolve(&txns, &iva(), &ResolveSettings::default()));
        assert!(set.transactions.is_empty());
        assert!(matches!(set.rejected[0].error, ImbalanceError::NoBalancingPosting { .. }));
    }

    #[test]
    fn test_balance_only_multi_commodity() {
        let txns = parse("2024-02-01 Exchange\n    Assets:USD  100 USD\n    Assets:MXN  -1700 MXN\n    Equity:Conversion\n");
        let set = balance_only(&txns, &ResolveSettings::default());
        let txn = &set.transactions[0];
        assert_eq!(txn.postings.len(), 4);
        assert!(txn.is_balanced());
        assert!(txn.postings.iter().filter(|p| p.account == "Equity:Conversion").count() == 2);
    }

    #[test]
    fn test_priced_posting_balances_in_price_commodity() {
        let txns = parse("2024-02-01 Buy\n    Assets:Broker  10 VOO @ $400\n    Assets:Checking\n");
        let set = balance_only(&txns, &ResolveSettings::default());
        let txn = &set.transactions[0];
        assert_eq!(txn.postings[1].amount, Amount::new(dec("-4000"), "$"));
        assert!(txn.is_balanced());
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let txns = parse(
            "2024-03-01 Huge price\n    Assets:Broker  1000000000000000 X @ 1000000000000000 Y\n    Assets:Checking\n\n\
             2024-03-02 Huge sum\n    Assets:Bank  50000000000000000000000000000\n    Assets:Savings  50000000000000000000000000000\n    Equity:Opening\n\n\
             2024-03-03 Huge tax\n    Expenses:Office  70000000000000000000000000000 MXN ; tax: IVA\n    Assets:Checking\n\n\
             2024-03-04 Lunch\n    Expenses:Food  10\n    Assets:Cash\n",
        );
        let set = resolved_set(resolve(&txns, &iva(), &ResolveSettings::default()));
        assert_eq!(set.transactions.len(), 1);
        assert_eq!(set.transactions[0].description, "Lunch");

        let errors: Vec<_> = set.rejected.iter().map(|r| r.error.clone()).collect();
        assert_eq!(
            errors,
            vec![
                ImbalanceError::Overflow { commodity: "Y".to_string() },
                ImbalanceError::Overflow { commodity: String::new() },
                ImbalanceError::Overflow { commodity: "MXN".to_string() },
            ]
        );
    }

    #[test]
    fn test_strict_accounts_reject_undeclared() {
        let txns = parse("2024-01-04 Lunch\n    Expenses:Food  10\n    Assets:Cash\n");
        let mut options = AnalysisOptions::default();
        options.strict_accounts = true;
        let settings = ResolveSettings::new(&options, &RootNames::default(), &["Assets:Cash".to_string()]);
        let set = balance_only(&txns, &settings);
        assert_eq!(
            set.rejected[0].error,
            ImbalanceError::UndeclaredAccount { account: "Expenses:Food".to_string() }
        );

        options.strict_accounts = false;
        let settings = ResolveSettings::new(&options, &RootNames::default(), &["Assets:Cash".to_string()]);
        assert_eq!(balance_only(&txns, &settings).transactions.len(), 1);
    }

    #[test]
    fn test_resolve_skipped_without_taxes() {
        let txns = parse("2024-01-04 Lunch\n    Expenses:Food  10\n    Assets:Cash\n");
        match resolve(&txns, &TaxDefinitionMap::new(), &ResolveSettings::default()) {
            TaxResolution::Skipped { transactions, .. } => assert_eq!(transactions, txns),
            TaxResolution::Resolved(_) => panic!("expected skip"),
        }
    }
}
