//! Collect facts from an ACOS device.
//!
//! Fact scraping never mutates the device, so the module runs identically in
//! check mode. Responses are gathered in tolerant mode and facts land in the
//! result data as `net_<fact>` keys.

use super::{
    Module, ModuleContext, ModuleOutput, ModuleParams, ModuleResult, ParallelizationHint,
    ParamExt,
};
use crate::device::AcosDevice;
use crate::facts;

pub struct AcosFactsModule;

impl Module for AcosFactsModule {
    fn name(&self) -> &'static str {
        "acos_facts"
    }

    fn description(&self) -> &'static str {
        "Collect facts from an A10 ACOS device"
    }

    fn parallelization_hint(&self) -> ParallelizationHint {
        ParallelizationHint::HostExclusive
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let requested = params.get_vec_string("gather_subset")?.unwrap_or_default();
        facts::resolve_subsets(&requested)?;
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let connection = context.require_connection(self.name())?;
        let device = AcosDevice::new(connection, context.config_cache.clone());

        let requested = params.get_vec_string("gather_subset")?.unwrap_or_default();
        let subsets = facts::resolve_subsets(&requested)?;
        let partition = params
            .get_string("partition")?
            .unwrap_or_else(|| "shared".to_string());

        device.activate_partition(&partition)?;

        let collection = facts::collect(&device, &subsets)?;

        let mut output = ModuleOutput::ok("Facts gathered");
        for (key, value) in collection.facts {
            output = output.with_data(key, value);
        }
        Ok(output.with_warnings(collection.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_unknown_subset() {
        let module = AcosFactsModule;
        let mut params = ModuleParams::new();
        params.insert("gather_subset".to_string(), serde_json::json!(["cpu"]));
        assert!(module.validate_params(&params).is_err());
    }

    #[test]
    fn test_validate_accepts_negation() {
        let module = AcosFactsModule;
        let mut params = ModuleParams::new();
        params.insert("gather_subset".to_string(), serde_json::json!(["!config"]));
        assert!(module.validate_params(&params).is_ok());
    }
}
