//! TaskManager - drives the goal-to-completion loop
//!
//! One cycle: pop the front task, execute it through the model, then ask the
//! model to refine the task list and fold the result into the accumulated
//! state. State is only mutated after a reply parses cleanly, so a cycle
//! that dies on malformed output leaves the pre-cycle state intact.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::console::{CompletionSink, Input, Output};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{BaseContext, GOOD_JSON_EXAMPLE, PromptLoader, RefineContext, RepairContext, TaskContext};
use crate::prompts::embedded::REPAIR_SYSTEM;
use crate::state::{JsonMap, RunState, StateStore};
use crate::tools::{self, ToolSpec};

use super::error::ManagerError;
use super::response::{self, CompletionCheck, RefineResponse, TaskListResponse};

/// Knobs for a run
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Re-execute a task already present in completed_tasks?
    pub allow_repeat_tasks: bool,

    /// Ask the input capability before executing each task
    pub confirm_execution: bool,

    /// Run the dedicated completion check when the queue drains without a verdict
    pub check_completion: bool,

    /// Repair calls allowed after a failed parse
    pub repair_attempts: u32,

    /// Hard ceiling on execute+refine cycles
    pub max_cycles: u32,

    /// Max tokens requested per completion
    pub max_tokens: u32,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            allow_repeat_tasks: true,
            confirm_execution: false,
            check_completion: true,
            repair_attempts: 2,
            max_cycles: 50,
            max_tokens: 8192,
        }
    }
}

impl ManagerOptions {
    /// Build options from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            allow_repeat_tasks: config.run.allow_repeat_tasks,
            confirm_execution: config.run.confirm_execution,
            check_completion: config.run.check_completion,
            repair_attempts: config.run.repair_attempts,
            max_cycles: config.run.max_cycles,
            max_tokens: config.llm.max_tokens,
        }
    }
}

/// Injected I/O seams for a run
pub struct Capabilities {
    pub output: Arc<dyn Output>,
    pub input: Arc<dyn Input>,
    pub sink: Arc<dyn CompletionSink>,
    pub store: Option<Arc<dyn StateStore>>,
}

/// What a finished run hands back
#[derive(Debug)]
pub struct RunOutcome {
    pub goal: String,
    pub final_result: JsonMap,
    pub cycles: u32,
}

/// The task-planning loop orchestrator
pub struct TaskManager {
    goal: String,
    tools_listing: String,
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    state: RunState,
    goal_complete: bool,
    caps: Capabilities,
    options: ManagerOptions,
}

/// Map a capability failure into a ManagerError
fn capability(e: eyre::Report) -> ManagerError {
    ManagerError::Capability(e.to_string())
}

impl TaskManager {
    /// Construct a manager, loading persisted state if a store is configured
    pub fn new(
        goal: impl Into<String>,
        tool_specs: &[ToolSpec],
        llm: Arc<dyn LlmClient>,
        prompts: PromptLoader,
        caps: Capabilities,
        options: ManagerOptions,
    ) -> Result<Self, ManagerError> {
        let goal = goal.into();
        let tools_listing = tools::listing(tool_specs);

        let mut state = RunState::default();
        if let Some(store) = &caps.store {
            match store.load()? {
                Some(loaded) => {
                    caps.output.status(&format!("loaded state from: {}", store.location()));
                    state = loaded;
                }
                None => {
                    caps.output.status(&format!(
                        "could not read {}, assuming a new file; it will be created on save",
                        store.location()
                    ));
                }
            }
        }

        Ok(Self {
            goal,
            tools_listing,
            llm,
            prompts,
            state,
            goal_complete: false,
            caps,
            options,
        })
    }

    /// Current run state (read-only view)
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Render the base system prompt from the current state values
    fn system_prompt(&self) -> Result<String, ManagerError> {
        let ctx = BaseContext {
            tools: self.tools_listing.clone(),
            goal: self.goal.clone(),
            current_tasks: self.state.tasks_json(),
            stored_info: serde_json::Value::Object(self.state.stored_info.clone()).to_string(),
            final_result: serde_json::Value::Object(self.state.final_result.clone()).to_string(),
        };
        self.prompts.render("base", &ctx).map_err(capability)
    }

    /// One round trip to the model
    async fn complete(&self, system_prompt: String, user: String) -> Result<String, ManagerError> {
        let request = CompletionRequest {
            system_prompt,
            messages: vec![Message::user(user)],
            max_tokens: self.options.max_tokens,
        };

        let response = self.llm.complete(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "completion finished"
        );
        Ok(response.content)
    }

    /// Parse a model reply, repairing malformed JSON a bounded number of times
    async fn parse_with_repair<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ManagerError> {
        let mut bad = raw.to_string();
        let mut last_err = match response::parse::<T>(&bad) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => e,
        };

        for attempt in 1..=self.options.repair_attempts {
            warn!(attempt, error = %last_err, "model output failed to parse, attempting repair");
            self.caps.output.status("repairing malformed model output");

            let user = self
                .prompts
                .render(
                    "repair",
                    &RepairContext {
                        example: GOOD_JSON_EXAMPLE.to_string(),
                        bad_json: bad.clone(),
                        error: last_err.to_string(),
                    },
                )
                .map_err(capability)?;

            let fixed = self.complete(REPAIR_SYSTEM.to_string(), user).await?;
            match response::parse::<T>(&fixed) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    bad = fixed;
                    last_err = e;
                }
            }
        }

        Err(ManagerError::MalformedResponse {
            attempts: self.options.repair_attempts,
            source: last_err,
        })
    }

    /// Ask the model for the initial ordered task list
    pub async fn create_initial_tasks(&mut self) -> Result<(), ManagerError> {
        self.caps.output.status("creating initial tasks");

        let system = self.system_prompt()?;
        let user = self.prompts.text("create").map_err(capability)?;
        let raw = self.complete(system, user).await?;

        let parsed: TaskListResponse = self.parse_with_repair(&raw).await?;
        self.state.current_tasks = parsed.current_tasks.into();

        self.caps
            .output
            .status(&format!("created {} tasks", self.state.current_tasks.len()));
        Ok(())
    }

    /// Pop and execute the front task
    ///
    /// Returns the (task, result) pair, or None when the task was skipped by
    /// the repeat policy or a declined confirmation.
    pub async fn execute_next_task(&mut self) -> Result<Option<(String, String)>, ManagerError> {
        let Some(task) = self.state.current_tasks.pop_front() else {
            return Ok(None);
        };

        if !self.options.allow_repeat_tasks && self.state.completed_tasks.contains_key(&task) {
            self.caps
                .output
                .status(&format!("skipping already-completed task: {}", task));
            return Ok(None);
        }

        if self.options.confirm_execution {
            let answer = self
                .caps
                .input
                .ask(&format!("execute task \"{}\"? [y/N] ", task))
                .map_err(capability)?;
            if !answer.trim().to_lowercase().starts_with('y') {
                self.caps.output.status(&format!("skipping task on request: {}", task));
                return Ok(None);
            }
        }

        self.caps.output.status(&format!("executing task: {}", task));

        let system = self.system_prompt()?;
        let user = self
            .prompts
            .render(
                "task",
                &TaskContext {
                    goal: self.goal.clone(),
                    remaining_tasks: self.state.tasks_json(),
                    task: task.clone(),
                    context: self.state.context_block(),
                },
            )
            .map_err(capability)?;

        let result = self.complete(system, user).await?;
        Ok(Some((task, result)))
    }

    /// Fold a completed task back into the plan
    ///
    /// State is overwritten only after the reply parses; a malformed reply
    /// that exhausts repair leaves every field as it was.
    pub async fn refine(&mut self, task: &str, result: &str) -> Result<(), ManagerError> {
        let system = self.system_prompt()?;
        let user = self
            .prompts
            .render(
                "refine",
                &RefineContext {
                    task: task.to_string(),
                    result: result.to_string(),
                },
            )
            .map_err(capability)?;

        let raw = self.complete(system, user).await?;
        let refined: RefineResponse = self.parse_with_repair(&raw).await?;

        self.state.current_tasks = refined.current_tasks.into();
        if let Some(stored_info) = refined.stored_info {
            self.state.stored_info = stored_info;
        }
        if let Some(final_result) = refined.final_result {
            self.state.final_result = final_result;
        }
        self.goal_complete = refined.goal_complete;
        self.state.completed_tasks.insert(task.to_string(), result.to_string());

        if let Some(thoughts) = refined.thoughts {
            self.caps.output.thought(&thoughts);
        }

        Ok(())
    }

    /// Final confirmation: ask the model to assess completion and clean up
    /// the final result
    ///
    /// Returns true when the verdict was "not complete" with replacement
    /// tasks, meaning the loop should resume.
    pub async fn check_completion(&mut self) -> Result<bool, ManagerError> {
        self.caps.output.status("checking whether the goal is complete");

        let system = self.system_prompt()?;
        let user = self.prompts.text("complete").map_err(capability)?;
        let raw = self.complete(system, user).await?;

        let check: CompletionCheck = self.parse_with_repair(&raw).await?;
        self.state.final_result = check.final_result;
        self.goal_complete = check.goal_complete;
        self.state.current_tasks = check.current_tasks.into();

        Ok(!self.goal_complete && !self.state.current_tasks.is_empty())
    }

    /// Save a snapshot if a store is configured
    fn persist(&self) -> Result<(), ManagerError> {
        if let Some(store) = &self.caps.store {
            store.save(&self.state)?;
            self.caps.output.status(&format!("saved state to: {}", store.location()));
        }
        Ok(())
    }

    /// Drive the goal to completion
    ///
    /// Creates tasks if none exist, then executes and refines until the
    /// model declares the goal complete or no tasks remain. The completion
    /// sink fires exactly once, and only on a successful finish.
    pub async fn run(mut self) -> Result<RunOutcome, ManagerError> {
        info!(goal = %self.goal, "starting run");

        if self.state.current_tasks.is_empty() && !self.goal_complete {
            self.create_initial_tasks().await?;
        }

        let mut cycles = 0u32;
        loop {
            while !self.goal_complete && !self.state.current_tasks.is_empty() {
                if cycles >= self.options.max_cycles {
                    return Err(ManagerError::CyclesExhausted(cycles));
                }
                cycles += 1;

                if let Some((task, result)) = self.execute_next_task().await? {
                    self.refine(&task, &result).await?;
                    self.persist()?;
                }
            }

            // Only confirm when the queue drained without an explicit verdict;
            // a refine that said goal_complete is taken at its word.
            if self.options.check_completion && !self.goal_complete && self.check_completion().await? {
                continue;
            }
            break;
        }

        info!(cycles, "run finished");
        self.caps.output.status("goal run finished");
        self.caps
            .sink
            .complete(&self.goal, &self.state.final_result)
            .map_err(capability)?;

        Ok(RunOutcome {
            goal: self.goal,
            final_result: self.state.final_result,
            cycles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use serde_json::json;

    use crate::console::fake::{RecordingOutput, RecordingSink, ScriptedInput};
    use crate::llm::client::mock::MockLlmClient;
    use crate::state::MemoryStore;

    struct Harness {
        output: Arc<RecordingOutput>,
        sink: Arc<RecordingSink>,
        store: Option<Arc<MemoryStore>>,
    }

    fn manager_with(
        llm: Arc<MockLlmClient>,
        options: ManagerOptions,
        input: Arc<ScriptedInput>,
        store: Option<Arc<MemoryStore>>,
    ) -> (TaskManager, Harness) {
        let output = Arc::new(RecordingOutput::new());
        let sink = Arc::new(RecordingSink::new());

        let caps = Capabilities {
            output: output.clone(),
            input,
            sink: sink.clone(),
            store: store.clone().map(|s| s as Arc<dyn StateStore>),
        };

        let tools = vec![ToolSpec::new("search", "Look things up")];
        let manager = TaskManager::new(
            "list three colors",
            &tools,
            llm,
            PromptLoader::embedded_only(),
            caps,
            options,
        )
        .unwrap();

        (manager, Harness { output, sink, store })
    }

    fn quiet_options() -> ManagerOptions {
        ManagerOptions {
            check_completion: false,
            ..Default::default()
        }
    }

    fn no_input() -> Arc<ScriptedInput> {
        Arc::new(ScriptedInput::new(&[]))
    }

    #[tokio::test]
    async fn test_colors_scenario_end_to_end() {
        let llm = Arc::new(MockLlmClient::scripted(&[
            // create
            r#"{"current_tasks": ["list three colors", "show results and terminate"]}"#,
            // execute "list three colors"
            "red, green, blue",
            // refine
            r#"{"current_tasks": ["show results and terminate"],
                "final_result": {"colors": ["red", "green", "blue"]},
                "goal_complete": false}"#,
            // execute "show results and terminate"
            "results shown",
            // refine
            r#"{"current_tasks": [],
                "final_result": {"colors": ["red", "green", "blue"]},
                "goal_complete": true}"#,
        ]));

        let (manager, harness) = manager_with(llm.clone(), quiet_options(), no_input(), None);
        let outcome = manager.run().await.unwrap();

        assert_eq!(outcome.cycles, 2);
        assert_eq!(outcome.final_result["colors"], json!(["red", "green", "blue"]));
        assert_eq!(llm.call_count(), 5);

        assert_eq!(harness.sink.count(), 1);
        let completions = harness.sink.completions.lock().unwrap();
        assert_eq!(completions[0].0, "list three colors");
        assert_eq!(completions[0].1["colors"], json!(["red", "green", "blue"]));
    }

    #[tokio::test]
    async fn test_zero_tasks_and_goal_complete_terminates_immediately() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let (mut manager, harness) = manager_with(llm.clone(), ManagerOptions::default(), no_input(), None);

        manager.goal_complete = true;
        let outcome = manager.run().await.unwrap();

        assert_eq!(outcome.cycles, 0);
        assert_eq!(llm.call_count(), 0);
        assert_eq!(harness.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_completed_task_is_not_reexecuted() {
        let mut persisted = RunState::default();
        persisted.current_tasks = VecDeque::from(["list three colors".to_string()]);
        persisted
            .completed_tasks
            .insert("list three colors".to_string(), "red, green, blue".to_string());
        persisted.final_result.insert("colors".to_string(), json!(["red"]));

        let store = Arc::new(MemoryStore::with_state(persisted));
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let options = ManagerOptions {
            allow_repeat_tasks: false,
            ..quiet_options()
        };

        let (manager, harness) = manager_with(llm.clone(), options, no_input(), Some(store));
        let outcome = manager.run().await.unwrap();

        // The lone queued task was already completed: no model call at all
        assert_eq!(llm.call_count(), 0);
        assert_eq!(outcome.final_result["colors"], json!(["red"]));
        assert_eq!(harness.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_then_repaired_response_proceeds() {
        let llm = Arc::new(MockLlmClient::scripted(&[
            // create, malformed
            "here are your tasks: current_tasks = [oops]",
            // repair reply, well-formed
            r#"{"current_tasks": ["list three colors", "show results and terminate"]}"#,
        ]));

        let (mut manager, _harness) = manager_with(llm.clone(), quiet_options(), no_input(), None);
        manager.create_initial_tasks().await.unwrap();

        assert_eq!(llm.call_count(), 2);
        assert_eq!(
            manager.state.current_tasks,
            VecDeque::from([
                "list three colors".to_string(),
                "show results and terminate".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_repair_exhaustion_is_fatal_and_preserves_state() {
        let llm = Arc::new(MockLlmClient::scripted(&["nope", "still nope", "not json either"]));
        let options = ManagerOptions {
            repair_attempts: 2,
            ..quiet_options()
        };

        let (mut manager, _harness) = manager_with(llm.clone(), options, no_input(), None);
        manager.state.current_tasks = VecDeque::from(["list three colors".to_string()]);
        manager.state.stored_info.insert("keep".to_string(), json!("me"));

        let err = manager.refine("list three colors", "red, green, blue").await.unwrap_err();
        assert!(err.is_malformed());
        // 1 refine call + 2 repair calls
        assert_eq!(llm.call_count(), 3);

        // Nothing from the malformed attempt leaked into state
        assert_eq!(manager.state.stored_info["keep"], json!("me"));
        assert!(manager.state.completed_tasks.is_empty());
        assert_eq!(manager.state.current_tasks, VecDeque::from(["list three colors".to_string()]));
    }

    #[tokio::test]
    async fn test_refine_without_stored_info_keeps_existing() {
        let llm = Arc::new(MockLlmClient::scripted(&[
            r#"{"current_tasks": [], "final_result": {"colors": ["red"]}, "goal_complete": true}"#,
        ]));

        let (mut manager, _harness) = manager_with(llm, quiet_options(), no_input(), None);
        manager.state.stored_info.insert("kept".to_string(), json!(1));

        manager.refine("list three colors", "red").await.unwrap();

        assert_eq!(manager.state.stored_info["kept"], json!(1));
        assert_eq!(manager.state.final_result["colors"], json!(["red"]));
        assert_eq!(
            manager.state.completed_tasks["list three colors"],
            "red".to_string()
        );
        assert!(manager.goal_complete);
    }

    #[tokio::test]
    async fn test_declined_confirmation_skips_task() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let options = ManagerOptions {
            confirm_execution: true,
            ..quiet_options()
        };
        let input = Arc::new(ScriptedInput::new(&["n"]));

        let (mut manager, _harness) = manager_with(llm.clone(), options, input, None);
        manager.state.current_tasks = VecDeque::from(["list three colors".to_string()]);

        let executed = manager.execute_next_task().await.unwrap();
        assert!(executed.is_none());
        assert_eq!(llm.call_count(), 0);
        assert!(manager.state.current_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_affirmative_confirmation_executes() {
        let llm = Arc::new(MockLlmClient::scripted(&["red, green, blue"]));
        let options = ManagerOptions {
            confirm_execution: true,
            ..quiet_options()
        };
        let input = Arc::new(ScriptedInput::new(&["y"]));

        let (mut manager, _harness) = manager_with(llm.clone(), options, input, None);
        manager.state.current_tasks = VecDeque::from(["list three colors".to_string()]);

        let (task, result) = manager.execute_next_task().await.unwrap().unwrap();
        assert_eq!(task, "list three colors");
        assert_eq!(result, "red, green, blue");
    }

    #[tokio::test]
    async fn test_completion_check_resumes_with_new_tasks() {
        let llm = Arc::new(MockLlmClient::scripted(&[
            // execute "list three colors"
            "red, green",
            // refine: queue drained, but no verdict
            r#"{"current_tasks": [], "final_result": {"colors": ["red", "green"]}, "goal_complete": false}"#,
            // completion check: not complete, one more task
            r#"{"final_result": {"colors": ["red", "green"]},
                "goal_complete": false,
                "current_tasks": ["find one more color"]}"#,
            // execute "find one more color"
            "blue",
            // refine: done
            r#"{"current_tasks": [], "final_result": {"colors": ["red", "green", "blue"]}, "goal_complete": true}"#,
        ]));

        let options = ManagerOptions::default();
        let (mut manager, harness) = manager_with(llm.clone(), options, no_input(), None);
        manager.state.current_tasks = VecDeque::from(["list three colors".to_string()]);

        let outcome = manager.run().await.unwrap();
        assert_eq!(outcome.final_result["colors"], json!(["red", "green", "blue"]));
        assert_eq!(llm.call_count(), 5);
        assert_eq!(harness.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_max_cycles_exhaustion_is_fatal() {
        let llm = Arc::new(MockLlmClient::scripted(&[
            "a result",
            // refine keeps the queue non-empty and the goal open
            r#"{"current_tasks": ["keep going", "show results and terminate"], "goal_complete": false}"#,
        ]));
        let options = ManagerOptions {
            max_cycles: 1,
            ..quiet_options()
        };

        let (mut manager, harness) = manager_with(llm, options, no_input(), None);
        manager.state.current_tasks = VecDeque::from(["first task".to_string()]);

        let err = manager.run().await.unwrap_err();
        assert!(matches!(err, ManagerError::CyclesExhausted(1)));
        // A fatal error never reaches the completion sink
        assert_eq!(harness.sink.count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_saved_after_each_refine() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(MockLlmClient::scripted(&[
            r#"{"current_tasks": ["list three colors"]}"#,
            "red, green, blue",
            r#"{"current_tasks": [], "final_result": {"colors": ["red", "green", "blue"]}, "goal_complete": true}"#,
        ]));

        let (manager, harness) = manager_with(llm, quiet_options(), no_input(), Some(store));
        manager.run().await.unwrap();

        let store = harness.store.unwrap();
        assert_eq!(*store.save_count.lock().unwrap(), 1);
        let saved = store.saved().unwrap();
        assert_eq!(saved.completed_tasks["list three colors"], "red, green, blue");
        assert_eq!(saved.final_result["colors"], json!(["red", "green", "blue"]));
    }

    #[tokio::test]
    async fn test_thoughts_are_echoed() {
        let llm = Arc::new(MockLlmClient::scripted(&[
            r#"{"current_tasks": [], "goal_complete": true, "thoughts": "that went well"}"#,
        ]));

        let (mut manager, harness) = manager_with(llm, quiet_options(), no_input(), None);
        manager.refine("list three colors", "red, green, blue").await.unwrap();

        let thoughts = harness.output.thoughts.lock().unwrap();
        assert_eq!(thoughts.as_slice(), ["that went well"]);
    }
}
