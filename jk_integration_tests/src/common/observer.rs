use jk_core::{Layer, ScoreData, Status, TestDefinition, TestResult};
use jk_probe::RunObserver;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Keeps every hook invocation as a short line, e.g. `test:stun`
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl RunObserver for RecordingObserver {
    fn on_run_started(&self, total: usize) {
        self.push(format!("run:{}", total));
    }

    fn on_layer_started(&self, layer: Layer) {
        self.push(format!("layer:{}", layer.number()));
    }

    fn on_test_started(&self, _layer: Layer, def: &TestDefinition) {
        self.push(format!("test:{}", def.id));
    }

    fn on_test_finished(&self, result: &TestResult, completed: usize, total: usize) {
        self.push(format!("done:{}:{}/{}", result.id, completed, total));
    }

    fn on_layer_finished(&self, layer: Layer, status: Status) {
        self.push(format!("layer-done:{}:{}", layer.number(), status));
    }

    fn on_run_finished(&self, score: &ScoreData) {
        self.push(format!("finished:{}", score.total_score));
    }
}

/// Cancels the run as soon as the given test starts
pub struct CancelAt {
    pub test_id: String,
    pub token: CancellationToken,
}

impl CancelAt {
    pub fn new(test_id: &str, token: CancellationToken) -> Self {
        Self {
            test_id: test_id.to_string(),
            token,
        }
    }
}

impl RunObserver for CancelAt {
    fn on_test_started(&self, _layer: Layer, def: &TestDefinition) {
        if def.id == self.test_id {
            self.token.cancel();
        }
    }
}
