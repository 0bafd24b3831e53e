use anyhow::{bail, Result};

use crate::counter::{OP_ADD_AND_GET, OP_COMPARE_AND_SET, OP_GET, OP_GET_AND_ADD, OP_SET};
use crate::local::PrimitiveService;
use crate::proto::{CounterAddRequest, CounterCompareAndSetRequest, CounterCompareAndSetResponse, CounterSetRequest, CounterValue, Empty};
use crate::utils::{decode_model, encode_model};
use tessera_core::{AppError, PrimitiveOperation};

/// The replicated state machine backing an atomic counter.
#[derive(Debug, Default)]
pub(crate) struct CounterService {
    value: i64,
}

impl PrimitiveService for CounterService {
    fn apply(&mut self, operation: &PrimitiveOperation) -> Result<Vec<u8>> {
        match operation.id.as_str() {
            OP_GET => encode_model(&CounterValue { value: self.value }),
            OP_SET => {
                let req: CounterSetRequest = decode_model(&operation.payload)?;
                self.value = req.value;
                encode_model(&Empty {})
            }
            OP_COMPARE_AND_SET => {
                let req: CounterCompareAndSetRequest = decode_model(&operation.payload)?;
                let succeeded = self.value == req.expect;
                if succeeded {
                    self.value = req.update;
                }
                encode_model(&CounterCompareAndSetResponse { succeeded })
            }
            OP_ADD_AND_GET => {
                let req: CounterAddRequest = decode_model(&operation.payload)?;
                self.value = self.value.wrapping_add(req.delta);
                encode_model(&CounterValue { value: self.value })
            }
            OP_GET_AND_ADD => {
                let req: CounterAddRequest = decode_model(&operation.payload)?;
                let previous = self.value;
                self.value = self.value.wrapping_add(req.delta);
                encode_model(&CounterValue { value: previous })
            }
            other => bail!(AppError::InvalidInput(format!("unknown atomic counter operation {}", other))),
        }
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        encode_model(&CounterValue { value: self.value })
    }

    fn restore(&mut self, data: &[u8]) -> Result<()> {
        let state: CounterValue = decode_model(data)?;
        self.value = state.value;
        Ok(())
    }
}
