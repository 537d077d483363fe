use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed record in one of the vendor's collections.
///
/// Implementations pair a wire schema (serde, camelCase aliases) with the
/// endpoint that serves it. A resource without a `seq` has never been
/// persisted: it can be created, but not read by identity, updated, or
/// deleted.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// API endpoint, e.g. `api/v2/creditTypes`.
    const ENDPOINT: &'static str;

    /// Relation fields inlined into responses via the `expand` query
    /// parameter.
    const EXPANDS: &'static [&'static str] = &[];

    /// The unique identifier of a persisted instance.
    fn seq(&self) -> Option<&str>;

    /// The collection name keying response envelopes: the last segment of
    /// [`Self::ENDPOINT`].
    fn collection() -> &'static str {
        Self::ENDPOINT
            .rsplit('/')
            .next()
            .unwrap_or(Self::ENDPOINT)
    }
}

/// Credit type lookup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type_seq: Option<String>,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreditType {
    /// A credit type that has not been persisted yet.
    pub fn new(id: impl Into<String>, description: Option<String>) -> Self {
        Self {
            data_type_seq: None,
            id: id.into(),
            description,
        }
    }
}

impl Resource for CreditType {
    const ENDPOINT: &'static str = "api/v2/creditTypes";

    fn seq(&self) -> Option<&str> {
        self.data_type_seq.as_deref()
    }
}

/// Event type lookup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type_seq: Option<String>,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Resource for EventType {
    const ENDPOINT: &'static str = "api/v2/eventTypes";

    fn seq(&self) -> Option<&str> {
        self.data_type_seq.as_deref()
    }
}

/// Reason code lookup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type_seq: Option<String>,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Resource for Reason {
    const ENDPOINT: &'static str = "api/v2/reasons";

    fn seq(&self) -> Option<&str> {
        self.data_type_seq.as_deref()
    }
}

/// A tenant calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_seq: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor_period_type: Option<Value>,
}

impl Resource for Calendar {
    const ENDPOINT: &'static str = "api/v2/calendars";

    fn seq(&self) -> Option<&str> {
        self.calendar_seq.as_deref()
    }
}

/// A calendar period. `calendar` and `period_type` hold a seq reference, or
/// the full related record when served with `expand`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_seq: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_type: Option<Value>,
}

impl Resource for Period {
    const ENDPOINT: &'static str = "api/v2/periods";
    const EXPANDS: &'static [&'static str] = &["calendar"];

    fn seq(&self) -> Option<&str> {
        self.period_seq.as_deref()
    }
}

/// A payee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee_seq: Option<String>,
    pub payee_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Resource for Participant {
    const ENDPOINT: &'static str = "api/v2/participants";

    fn seq(&self) -> Option<&str> {
        self.payee_seq.as_deref()
    }
}

/// A sales transaction.
///
/// Listing this collection is subject to a server defect: any page size above
/// one returns duplicated rows, so the client forces `top=1` for this
/// endpoint only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_transaction_seq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<Value>,
}

impl Resource for SalesTransaction {
    const ENDPOINT: &'static str = "api/v2/salesTransactions";

    fn seq(&self) -> Option<&str> {
        self.sales_transaction_seq.as_deref()
    }
}

/// Execution state of a server-side pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Scheduled,
    Running,
    Done,
}

impl PipelineState {
    /// `Done` is the only terminal state; `status` is meaningful once a run
    /// reaches it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done)
    }
}

/// Outcome of a pipeline run. Only meaningful when the run's state is
/// [`PipelineState::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Running,
    Successful,
    Failed,
    Cancelled,
}

/// The server-tracked execution record of a submitted pipeline job.
///
/// Created by [`Tenant::run_pipeline`](crate::Tenant::run_pipeline) and
/// mutated only by server-side execution. Poll it by re-fetching with
/// [`Tenant::read`](crate::Tenant::read) until the state is terminal; the
/// client deliberately ships no internal poll loop, so interval and deadline
/// policy stay with the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub pipeline_run_seq: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_submitted: Option<String>,
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PipelineStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_errors: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_warnings: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Value>,
}

impl Resource for Pipeline {
    const ENDPOINT: &'static str = "api/v2/pipelines";

    fn seq(&self) -> Option<&str> {
        Some(&self.pipeline_run_seq)
    }
}

/// A batch job submission payload. Has no identity until submitted; the
/// server answers with the seq of the [`Pipeline`] tracking its execution.
pub trait PipelineJob: Serialize + Send + Sync {
    /// Jobs are posted to the pipelines endpoint regardless of command.
    const ENDPOINT: &'static str = "api/v2/pipelines";

    /// The vendor command discriminator, e.g. `PipelineRun`.
    fn command(&self) -> &'static str;
}

/// Vendor stage-type identifiers. Opaque; the server echoes them back as
/// `Pipeline::stage_type`.
pub mod stages {
    pub const CLASSIFY: &str = "21673573206720515";
    pub const ALLOCATE: &str = "21673573206720516";
    pub const REWARD: &str = "21673573206720518";
    pub const PAY: &str = "21673573206720519";
    pub const SUMMARIZE: &str = "21673573206720531";
    pub const COMPENSATE: &str = "21673573206720530";
    pub const COMPENSATE_AND_PAY: &str = "21673573206720532";
    pub const POST: &str = "21673573206720520";
    pub const FINALIZE: &str = "21673573206720521";
    pub const PURGE: &str = "21673573206720522";
    pub const VALIDATE: &str = "21673573206720514";
    pub const TRANSFER: &str = "21673573206720526";
    pub const VALIDATE_AND_TRANSFER: &str = "21673573206720525";
    pub const TRANSFER_IF_ALL_VALID: &str = "21673573206720527";
    pub const VALIDATE_AND_TRANSFER_IF_ALL_VALID: &str = "21673573206720528";
    pub const RESET_FROM_VALIDATE: &str = "21673573206720523";
    pub const XML_IMPORT: &str = "21673573206720533";
}

/// The staging area an import or purge targets, mapped to the vendor's
/// stage-table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageModule {
    TransactionalData,
    OrganizationData,
    ClassificationData,
    PlanRelatedData,
}

impl StageModule {
    /// Stage tables submitted for this module.
    pub fn stage_tables(&self) -> &'static [&'static str] {
        match self {
            StageModule::TransactionalData => &["TransactionalData"],
            StageModule::OrganizationData => {
                &["Participants", "Positions", "PositionRelations", "Titles"]
            }
            StageModule::ClassificationData => &[
                "Categories",
                "Customers",
                "Products",
                "PostalCodes",
                "GenericClassifiers",
            ],
            StageModule::PlanRelatedData => &[
                "FixedValues",
                "VariableAssignments",
                "Quotas",
                "RateTableDimensions",
            ],
        }
    }
}

/// How an import treats rows already present in the stage tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportRunMode {
    All,
    /// Only valid when importing transactional data.
    New,
}

/// Scope of a compensation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineRunMode {
    Full,
    Incremental,
    Positions,
}

/// Imports an XML plan document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlImport {
    command: &'static str,
    stage_type_seq: &'static str,
    pub xml_file_name: String,
    pub xml_file_content: String,
    pub update_existing_objects: bool,
}

impl XmlImport {
    pub fn new(
        file_name: impl Into<String>,
        content: impl Into<String>,
        update_existing_objects: bool,
    ) -> Self {
        Self {
            command: "XMLImport",
            stage_type_seq: stages::XML_IMPORT,
            xml_file_name: file_name.into(),
            xml_file_content: content.into(),
            update_existing_objects,
        }
    }
}

impl PipelineJob for XmlImport {
    fn command(&self) -> &'static str {
        self.command
    }
}

/// Validates and/or transfers a stage-table batch into the tenant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    command: &'static str,
    stage_type_seq: &'static str,
    pub calendar_seq: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_seq: Option<String>,
    pub stage_tables: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_mode: Option<ImportRunMode>,
}

impl Import {
    fn stage(
        stage_type_seq: &'static str,
        calendar_seq: impl Into<String>,
        batch_name: impl Into<String>,
        module: StageModule,
    ) -> Self {
        Self {
            command: "Import",
            stage_type_seq,
            calendar_seq: calendar_seq.into(),
            batch_name: Some(batch_name.into()),
            period_seq: None,
            stage_tables: module.stage_tables(),
            run_mode: None,
        }
    }

    pub fn validate(
        calendar_seq: impl Into<String>,
        batch_name: impl Into<String>,
        module: StageModule,
    ) -> Self {
        Self::stage(stages::VALIDATE, calendar_seq, batch_name, module)
    }

    pub fn transfer(
        calendar_seq: impl Into<String>,
        batch_name: impl Into<String>,
        module: StageModule,
    ) -> Self {
        Self::stage(stages::TRANSFER, calendar_seq, batch_name, module)
    }

    pub fn validate_and_transfer(
        calendar_seq: impl Into<String>,
        batch_name: impl Into<String>,
        module: StageModule,
    ) -> Self {
        Self::stage(stages::VALIDATE_AND_TRANSFER, calendar_seq, batch_name, module)
    }

    pub fn transfer_if_all_valid(
        calendar_seq: impl Into<String>,
        batch_name: impl Into<String>,
        module: StageModule,
    ) -> Self {
        Self::stage(stages::TRANSFER_IF_ALL_VALID, calendar_seq, batch_name, module)
    }

    pub fn validate_and_transfer_if_all_valid(
        calendar_seq: impl Into<String>,
        batch_name: impl Into<String>,
        module: StageModule,
    ) -> Self {
        Self::stage(
            stages::VALIDATE_AND_TRANSFER_IF_ALL_VALID,
            calendar_seq,
            batch_name,
            module,
        )
    }

    /// Rolls a period back to the validate stage. `batch_name` is optional
    /// here; without one, every batch in the period is reset.
    pub fn reset_from_validate(
        calendar_seq: impl Into<String>,
        period_seq: impl Into<String>,
        batch_name: Option<String>,
    ) -> Self {
        Self {
            command: "Import",
            stage_type_seq: stages::RESET_FROM_VALIDATE,
            calendar_seq: calendar_seq.into(),
            batch_name,
            period_seq: Some(period_seq.into()),
            stage_tables: StageModule::TransactionalData.stage_tables(),
            run_mode: None,
        }
    }

    pub fn with_run_mode(mut self, run_mode: ImportRunMode) -> Self {
        self.run_mode = Some(run_mode);
        self
    }
}

impl PipelineJob for Import {
    fn command(&self) -> &'static str {
        self.command
    }
}

/// Purges a stage-table batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purge {
    command: &'static str,
    stage_type_seq: &'static str,
    pub batch_name: String,
    pub stage_tables: &'static [&'static str],
}

impl Purge {
    pub fn new(batch_name: impl Into<String>, module: StageModule) -> Self {
        Self {
            command: "Purge",
            stage_type_seq: stages::PURGE,
            batch_name: batch_name.into(),
            stage_tables: module.stage_tables(),
        }
    }
}

impl PipelineJob for Purge {
    fn command(&self) -> &'static str {
        self.command
    }
}

/// A compensation run over one calendar period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    command: &'static str,
    stage_type_seq: &'static str,
    pub calendar_seq: String,
    pub period_seq: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_mode: Option<PipelineRunMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_seqs: Option<Vec<String>>,
}

impl PipelineRun {
    fn stage(
        stage_type_seq: &'static str,
        calendar_seq: impl Into<String>,
        period_seq: impl Into<String>,
    ) -> Self {
        Self {
            command: "PipelineRun",
            stage_type_seq,
            calendar_seq: calendar_seq.into(),
            period_seq: period_seq.into(),
            run_mode: None,
            position_groups: None,
            position_seqs: None,
        }
    }

    pub fn classify(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::CLASSIFY, calendar_seq, period_seq)
    }

    pub fn allocate(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::ALLOCATE, calendar_seq, period_seq)
    }

    pub fn reward(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::REWARD, calendar_seq, period_seq)
    }

    pub fn pay(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::PAY, calendar_seq, period_seq)
    }

    pub fn summarize(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::SUMMARIZE, calendar_seq, period_seq)
    }

    /// Classify through reward in one run.
    pub fn compensate(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::COMPENSATE, calendar_seq, period_seq)
    }

    pub fn compensate_and_pay(
        calendar_seq: impl Into<String>,
        period_seq: impl Into<String>,
    ) -> Self {
        Self::stage(stages::COMPENSATE_AND_PAY, calendar_seq, period_seq)
    }

    pub fn post(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::POST, calendar_seq, period_seq)
    }

    pub fn finalize(calendar_seq: impl Into<String>, period_seq: impl Into<String>) -> Self {
        Self::stage(stages::FINALIZE, calendar_seq, period_seq)
    }

    pub fn with_run_mode(mut self, run_mode: PipelineRunMode) -> Self {
        self.run_mode = Some(run_mode);
        self
    }

    /// Restrict a `positions` run to the named position groups.
    pub fn with_position_groups(mut self, groups: Vec<String>) -> Self {
        self.run_mode = Some(PipelineRunMode::Positions);
        self.position_groups = Some(groups);
        self
    }

    /// Restrict a `positions` run to the given position seqs.
    pub fn with_position_seqs(mut self, seqs: Vec<String>) -> Self {
        self.run_mode = Some(PipelineRunMode::Positions);
        self.position_seqs = Some(seqs);
        self
    }
}

impl PipelineJob for PipelineRun {
    fn command(&self) -> &'static str {
        self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_is_last_endpoint_segment() {
        assert_eq!(CreditType::collection(), "creditTypes");
        assert_eq!(Pipeline::collection(), "pipelines");
        assert_eq!(SalesTransaction::collection(), "salesTransactions");
    }

    #[test]
    fn unsaved_resource_has_no_seq() {
        let credit_type = CreditType::new("SPIFF", None);
        assert!(credit_type.seq().is_none());
    }

    #[test]
    fn resource_decodes_with_wire_aliases() {
        let credit_type: CreditType = serde_json::from_value(serde_json::json!({
            "dataTypeSeq": "12345",
            "id": "SPIFF",
            "description": "Incentive credits",
        }))
        .unwrap();
        assert_eq!(credit_type.seq(), Some("12345"));
        assert_eq!(credit_type.id, "SPIFF");
    }

    #[test]
    fn xml_import_carries_command_and_stage_type() {
        let job = XmlImport::new("plan.xml", "<xml></xml>", true);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["command"], "XMLImport");
        assert_eq!(value["stageTypeSeq"], stages::XML_IMPORT);
        assert_eq!(value["updateExistingObjects"], true);
    }

    #[test]
    fn import_serializes_stage_tables_for_module() {
        let job = Import::validate("1", "batch.txt", StageModule::OrganizationData);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["command"], "Import");
        assert_eq!(
            value["stageTables"],
            serde_json::json!(["Participants", "Positions", "PositionRelations", "Titles"]),
        );
        // run_mode was not set and must not appear on the wire.
        assert!(value.get("runMode").is_none());
    }

    #[test]
    fn import_run_mode_serializes_lowercase() {
        let job = Import::validate("1", "batch.txt", StageModule::TransactionalData)
            .with_run_mode(ImportRunMode::New);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["runMode"], "new");
    }

    #[test]
    fn pipeline_run_positions_scope() {
        let job = PipelineRun::classify("1", "2").with_position_groups(vec!["EMEA".into()]);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["command"], "PipelineRun");
        assert_eq!(value["runMode"], "positions");
        assert_eq!(value["positionGroups"], serde_json::json!(["EMEA"]));
        assert!(value.get("positionSeqs").is_none());
    }

    #[test]
    fn pipeline_state_terminal() {
        assert!(PipelineState::Done.is_terminal());
        assert!(!PipelineState::Running.is_terminal());
        assert!(!PipelineState::Scheduled.is_terminal());
    }

    #[test]
    fn pipeline_decodes_state_and_status() {
        let pipeline: Pipeline = serde_json::from_value(serde_json::json!({
            "pipelineRunSeq": "4711",
            "command": "PipelineRun",
            "stageType": stages::CLASSIFY,
            "state": "Done",
            "status": "Successful",
            "numErrors": 0,
        }))
        .unwrap();
        assert_eq!(pipeline.seq(), Some("4711"));
        assert!(pipeline.state.is_terminal());
        assert_eq!(pipeline.status, Some(PipelineStatus::Successful));
    }
}
