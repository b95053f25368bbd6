//! Built-in lifecycle handlers and the startup registration table.
//!
//! # Responsibility
//! - Provide the default audit, identity, void, retire, cascade, complex
//!   storage and sequence handlers.
//! - Register them from one explicit table.
//!
//! # Invariants
//! - Reason checks run ahead of the default order; everything else runs at
//!   the configured default order, in table order.

use crate::advice::category::LifecycleCategory;
use crate::advice::registry::{HandlerRegistry, LifecycleHandler, RegistryError, TypeFilter};
use crate::config::AdviceConfig;
use crate::model::capability::Capability;
use crate::repo::ClinicalRepository;
use std::sync::Arc;

pub mod audit;
pub mod cascade;
pub mod complex_obs;
pub mod identity;
pub mod retire;
pub mod sequence;
pub mod void;

use audit::AuditSaveHandler;
use cascade::RecordCascadeHandler;
use complex_obs::{ComplexObsRegistry, ComplexObsSaveHandler};
use identity::UuidSaveHandler;
use retire::{BaseRetireHandler, BaseUnretireHandler};
use sequence::{ConceptCodeHandler, SequenceGenerator};
use void::{
    BaseUnvoidHandler, BaseVoidHandler, RequireVoidReasonHandler, RequireVoidReasonOnSaveHandler,
    VOIDED_SAVE_REASON_ORDER, VOID_REASON_ORDER,
};

/// Collaborators the built-in handlers hold on to.
#[derive(Clone)]
pub struct BuiltinDeps {
    pub config: AdviceConfig,
    pub repository: Arc<dyn ClinicalRepository>,
    pub complex_storages: Arc<ComplexObsRegistry>,
    pub concept_codes: Arc<SequenceGenerator>,
}

/// One row of the registration table. `order: None` takes the configured
/// default order.
pub struct HandlerSpec {
    pub category: LifecycleCategory,
    pub filter: TypeFilter,
    pub order: Option<i32>,
    pub handler: Arc<dyn LifecycleHandler>,
}

impl HandlerSpec {
    fn new(
        category: LifecycleCategory,
        filter: TypeFilter,
        handler: Arc<dyn LifecycleHandler>,
    ) -> Self {
        Self {
            category,
            filter,
            order: None,
            handler,
        }
    }

    fn ordered(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

/// Built-in handler table, in registration order.
pub fn builtin_table(deps: &BuiltinDeps) -> Vec<HandlerSpec> {
    use LifecycleCategory::{Retire, Save, Unretire, Unvoid, Void};

    let voidable = TypeFilter::Capability(Capability::Voidable);
    let retireable = TypeFilter::Capability(Capability::Retireable);
    let repository = &deps.repository;

    vec![
        HandlerSpec::new(Save, voidable, Arc::new(RequireVoidReasonOnSaveHandler))
            .ordered(VOIDED_SAVE_REASON_ORDER),
        HandlerSpec::new(Save, TypeFilter::Any, Arc::new(UuidSaveHandler)),
        HandlerSpec::new(
            Save,
            TypeFilter::Capability(Capability::Auditable),
            Arc::new(AuditSaveHandler),
        ),
        HandlerSpec::new(
            Save,
            TypeFilter::Type("Concept"),
            Arc::new(ConceptCodeHandler::new(
                deps.concept_codes.clone(),
                deps.config.concept_code_prefix.clone(),
            )),
        ),
        HandlerSpec::new(
            Save,
            TypeFilter::Type("Obs"),
            Arc::new(ComplexObsSaveHandler::new(deps.complex_storages.clone())),
        ),
        HandlerSpec::new(
            Void,
            voidable,
            Arc::new(RequireVoidReasonHandler::new(deps.config.clone())),
        )
        .ordered(VOID_REASON_ORDER),
        HandlerSpec::new(Void, voidable, Arc::new(BaseVoidHandler)),
        HandlerSpec::new(
            Void,
            TypeFilter::Type("Patient"),
            Arc::new(RecordCascadeHandler::patient(
                "patient_void_cascade",
                repository.clone(),
            )),
        ),
        HandlerSpec::new(
            Void,
            TypeFilter::Type("Visit"),
            Arc::new(RecordCascadeHandler::visit(
                "visit_void_cascade",
                repository.clone(),
            )),
        ),
        HandlerSpec::new(Unvoid, voidable, Arc::new(BaseUnvoidHandler)),
        HandlerSpec::new(
            Unvoid,
            TypeFilter::Type("Patient"),
            Arc::new(RecordCascadeHandler::patient(
                "patient_unvoid_cascade",
                repository.clone(),
            )),
        ),
        HandlerSpec::new(
            Unvoid,
            TypeFilter::Type("Visit"),
            Arc::new(RecordCascadeHandler::visit(
                "visit_unvoid_cascade",
                repository.clone(),
            )),
        ),
        HandlerSpec::new(Retire, retireable, Arc::new(BaseRetireHandler)),
        HandlerSpec::new(Unretire, retireable, Arc::new(BaseUnretireHandler)),
    ]
}

/// Registers the built-in table into `registry`.
pub fn register_builtin(
    registry: &mut HandlerRegistry,
    deps: &BuiltinDeps,
) -> Result<(), RegistryError> {
    let default_order = deps.config.default_handler_order;
    for spec in builtin_table(deps) {
        registry.register_ordered(
            spec.category,
            spec.filter,
            spec.order.unwrap_or(default_order),
            spec.handler,
        )?;
    }
    log::info!(
        "event=handler_registry module=handlers status=ok handlers={}",
        registry.len()
    );
    Ok(())
}
