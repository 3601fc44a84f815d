use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{parse_response, PlannerError, PlannerRequest, PlannerResponse, StepPlanner};

/// Deterministic planner that replays queued answers in order.
///
/// With nothing queued it answers with an empty, completed batch.
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    answers: Mutex<VecDeque<Result<PlannerResponse, PlannerError>>>,
    requests: Mutex<Vec<PlannerRequest>>,
}

impl ScriptedPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: PlannerResponse) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(Ok(response));
        }
    }

    /// Queue raw model output, parsed the same way a live answer would be.
    pub fn push_raw(&self, text: &str) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(parse_response(text));
        }
    }

    pub fn push_error(&self, error: PlannerError) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(Err(error));
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<PlannerRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StepPlanner for ScriptedPlanner {
    async fn plan(&self, request: &PlannerRequest) -> Result<PlannerResponse, PlannerError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self
            .answers
            .lock()
            .map_err(|_| PlannerError::Transport("scripted planner poisoned".to_string()))?
            .pop_front();
        next.unwrap_or_else(|| {
            Ok(PlannerResponse {
                completed: true,
                ..Default::default()
            })
        })
    }
}
