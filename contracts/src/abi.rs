//! Contract ABI for the SecretBox contract
//!
//! Function selectors are the first 4 bytes of the Keccak-256 hash of the
//! canonical signature, and parameters use the standard head/tail encoding
//! (32-byte words, dynamic values referenced by offset), so calldata matches
//! what any EVM tooling produces for the same call.

use crate::errors::{ChainError, ChainResult};
use secretbox_fhe::EncryptedInput;
use secretbox_primitives::Handle;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Size of function selector in bytes
pub const SELECTOR_SIZE: usize = 4;

/// ABI word size
pub const WORD_SIZE: usize = 32;

/// `openBox(bytes32 choiceEncrypted, bytes inputProof) returns (bytes32)`
pub const OPEN_BOX: &str = "openBox";

/// `numberOfBoxes() view returns (uint8)`
pub const NUMBER_OF_BOXES: &str = "numberOfBoxes";

/// ABI type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ABIType {
    /// Unsigned 8-bit integer
    Uint8,
    /// Fixed-size bytes (32 bytes); also the wire type of encrypted handles
    Bytes32,
    /// Variable-size bytes
    Bytes,
}

impl ABIType {
    /// Canonical type string for signatures
    pub fn type_string(&self) -> &'static str {
        match self {
            ABIType::Uint8 => "uint8",
            ABIType::Bytes32 => "bytes32",
            ABIType::Bytes => "bytes",
        }
    }

    /// Whether the value lives in the tail section
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ABIType::Bytes)
    }
}

/// ABI value - typed parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ABIValue {
    Uint8(u8),
    Bytes32([u8; 32]),
    Bytes(Vec<u8>),
}

impl ABIValue {
    /// Get the type of this value
    pub fn abi_type(&self) -> ABIType {
        match self {
            ABIValue::Uint8(_) => ABIType::Uint8,
            ABIValue::Bytes32(_) => ABIType::Bytes32,
            ABIValue::Bytes(_) => ABIType::Bytes,
        }
    }

    /// Extract uint8 value
    pub fn as_uint8(&self) -> ChainResult<u8> {
        match self {
            ABIValue::Uint8(v) => Ok(*v),
            _ => Err(ChainError::ABIDecodingError(format!(
                "Expected uint8, got {:?}",
                self.abi_type()
            ))),
        }
    }

    /// Extract bytes32 value
    pub fn as_bytes32(&self) -> ChainResult<[u8; 32]> {
        match self {
            ABIValue::Bytes32(v) => Ok(*v),
            _ => Err(ChainError::ABIDecodingError(format!(
                "Expected bytes32, got {:?}",
                self.abi_type()
            ))),
        }
    }

    /// Extract bytes value
    pub fn as_bytes(&self) -> ChainResult<&[u8]> {
        match self {
            ABIValue::Bytes(v) => Ok(v),
            _ => Err(ChainError::ABIDecodingError(format!(
                "Expected bytes, got {:?}",
                self.abi_type()
            ))),
        }
    }
}

/// Compute function selector from signature string
///
/// Example: "numberOfBoxes()" -> first 4 bytes of keccak256("numberOfBoxes()")
pub fn compute_selector(signature: &str) -> [u8; SELECTOR_SIZE] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Build canonical function signature from name and parameter types
pub fn build_signature(name: &str, param_types: &[ABIType]) -> String {
    let types: Vec<&str> = param_types.iter().map(|t| t.type_string()).collect();
    format!("{}({})", name, types.join(","))
}

/// Function ABI definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionABI {
    /// Function name
    pub name: String,
    /// 4-byte function selector
    pub selector: [u8; SELECTOR_SIZE],
    /// Input parameter types
    pub inputs: Vec<ABIType>,
    /// Output parameter types
    pub outputs: Vec<ABIType>,
    /// Whether function mutates state
    pub mutates: bool,
}

impl FunctionABI {
    /// Create new function ABI
    pub fn new(name: &str, inputs: Vec<ABIType>, outputs: Vec<ABIType>, mutates: bool) -> Self {
        let signature = build_signature(name, &inputs);
        let selector = compute_selector(&signature);
        Self {
            name: name.to_string(),
            selector,
            inputs,
            outputs,
            mutates,
        }
    }

    /// Get canonical signature string
    pub fn signature(&self) -> String {
        build_signature(&self.name, &self.inputs)
    }

    /// Check if selector matches
    pub fn matches_selector(&self, selector: &[u8]) -> bool {
        selector.len() >= SELECTOR_SIZE && self.selector == selector[..SELECTOR_SIZE]
    }

    /// Validate input parameters
    pub fn validate_inputs(&self, params: &[ABIValue]) -> ChainResult<()> {
        if params.len() != self.inputs.len() {
            return Err(ChainError::ParameterCountMismatch {
                expected: self.inputs.len(),
                got: params.len(),
            });
        }

        for (i, (param, expected_type)) in params.iter().zip(self.inputs.iter()).enumerate() {
            if param.abi_type() != *expected_type {
                return Err(ChainError::InvalidParameterType {
                    index: i,
                    message: format!("expected {:?}, got {:?}", expected_type, param.abi_type()),
                });
            }
        }

        Ok(())
    }
}

/// Contract ABI - collection of function ABIs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractABI {
    /// Contract name
    pub name: String,
    /// Function definitions
    pub functions: Vec<FunctionABI>,
}

impl ContractABI {
    /// Create new contract ABI
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
        }
    }

    /// The SecretBox contract surface
    pub fn secret_box() -> Self {
        let mut abi = Self::new("SecretBox");
        abi.add_function(FunctionABI::new(
            OPEN_BOX,
            vec![ABIType::Bytes32, ABIType::Bytes],
            vec![ABIType::Bytes32],
            true,
        ));
        abi.add_function(FunctionABI::new(
            NUMBER_OF_BOXES,
            vec![],
            vec![ABIType::Uint8],
            false,
        ));
        abi
    }

    /// Add function to ABI
    pub fn add_function(&mut self, function: FunctionABI) {
        self.functions.push(function);
    }

    /// Find function by selector
    pub fn get_function_by_selector(&self, selector: &[u8]) -> Option<&FunctionABI> {
        self.functions.iter().find(|f| f.matches_selector(selector))
    }

    /// Find function by name
    pub fn get_function_by_name(&self, name: &str) -> Option<&FunctionABI> {
        self.functions.iter().find(|f| f.name == name)
    }

    fn function(&self, name: &str) -> ChainResult<&FunctionABI> {
        self.get_function_by_name(name)
            .ok_or_else(|| ChainError::ABIEncodingError(format!("unknown function {name}")))
    }
}

/// ABI Encoder - head/tail encoding of a parameter tuple
pub struct ABIEncoder {
    head: Vec<u8>,
    tail: Vec<u8>,
    head_size: usize,
}

impl ABIEncoder {
    /// Encoder for a tuple of `param_count` parameters
    pub fn new(param_count: usize) -> Self {
        Self {
            head: Vec::with_capacity(param_count * WORD_SIZE),
            tail: Vec::new(),
            head_size: param_count * WORD_SIZE,
        }
    }

    /// Encode the next value
    pub fn encode(&mut self, value: &ABIValue) {
        match value {
            ABIValue::Uint8(v) => {
                let mut word = [0u8; WORD_SIZE];
                word[WORD_SIZE - 1] = *v;
                self.head.extend_from_slice(&word);
            }
            ABIValue::Bytes32(v) => {
                self.head.extend_from_slice(v);
            }
            ABIValue::Bytes(v) => {
                let offset = self.head_size + self.tail.len();
                self.head.extend_from_slice(&usize_word(offset));
                self.tail.extend_from_slice(&usize_word(v.len()));
                self.tail.extend_from_slice(v);
                let padding = (WORD_SIZE - v.len() % WORD_SIZE) % WORD_SIZE;
                self.tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }

    /// Finish and get encoded bytes
    pub fn finish(mut self) -> Vec<u8> {
        self.head.append(&mut self.tail);
        self.head
    }
}

/// ABI Decoder - reads a head/tail encoded tuple
pub struct ABIDecoder<'a> {
    data: &'a [u8],
}

impl<'a> ABIDecoder<'a> {
    /// Create decoder over encoded tuple bytes (no selector)
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode the values of `types`
    pub fn decode_all(&self, types: &[ABIType]) -> ChainResult<Vec<ABIValue>> {
        types
            .iter()
            .enumerate()
            .map(|(i, t)| self.decode_at(i, *t))
            .collect()
    }

    fn decode_at(&self, index: usize, abi_type: ABIType) -> ChainResult<ABIValue> {
        let word = self.word(index * WORD_SIZE)?;
        match abi_type {
            ABIType::Uint8 => {
                if word[..WORD_SIZE - 1].iter().any(|b| *b != 0) {
                    return Err(ChainError::ABIDecodingError(
                        "uint8 value out of range".to_string(),
                    ));
                }
                Ok(ABIValue::Uint8(word[WORD_SIZE - 1]))
            }
            ABIType::Bytes32 => Ok(ABIValue::Bytes32(word)),
            ABIType::Bytes => {
                let offset = word_to_usize(&word)?;
                let len = word_to_usize(&self.word(offset)?)?;
                let start = offset + WORD_SIZE;
                let end = start.checked_add(len).filter(|end| *end <= self.data.len()).ok_or_else(|| {
                    ChainError::ABIDecodingError(format!("bytes length {len} exceeds data"))
                })?;
                Ok(ABIValue::Bytes(self.data[start..end].to_vec()))
            }
        }
    }

    fn word(&self, at: usize) -> ChainResult<[u8; WORD_SIZE]> {
        let slice = self
            .data
            .get(at..at + WORD_SIZE)
            .ok_or_else(|| ChainError::ABIDecodingError(format!("not enough data for word at {at}")))?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(slice);
        Ok(word)
    }
}

fn usize_word(value: usize) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn word_to_usize(word: &[u8; WORD_SIZE]) -> ChainResult<usize> {
    if word[..WORD_SIZE - 8].iter().any(|b| *b != 0) {
        return Err(ChainError::ABIDecodingError("offset does not fit in u64".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[WORD_SIZE - 8..]);
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| ChainError::ABIDecodingError("offset does not fit in usize".to_string()))
}

/// Encode function call with selector and parameters
pub fn encode_function_call(function: &FunctionABI, params: &[ABIValue]) -> ChainResult<Vec<u8>> {
    function.validate_inputs(params)?;

    let mut encoder = ABIEncoder::new(params.len());
    for param in params {
        encoder.encode(param);
    }

    let mut out = function.selector.to_vec();
    out.extend(encoder.finish());
    Ok(out)
}

/// Decode call data against a contract ABI
pub fn decode_function_call<'a>(
    abi: &'a ContractABI,
    data: &[u8],
) -> ChainResult<(&'a FunctionABI, Vec<ABIValue>)> {
    if data.len() < SELECTOR_SIZE {
        return Err(ChainError::ABIDecodingError("Not enough data for selector".to_string()));
    }
    let function = abi.get_function_by_selector(&data[..SELECTOR_SIZE]).ok_or_else(|| {
        ChainError::ABIDecodingError(format!("unknown selector 0x{}", hex::encode(&data[..SELECTOR_SIZE])))
    })?;
    let params = ABIDecoder::new(&data[SELECTOR_SIZE..]).decode_all(&function.inputs)?;
    Ok((function, params))
}

/// Decode return values of `function`
pub fn decode_return(function: &FunctionABI, data: &[u8]) -> ChainResult<Vec<ABIValue>> {
    ABIDecoder::new(data).decode_all(&function.outputs)
}

/// Call data for `openBox(choiceEncrypted, inputProof)`
pub fn encode_open_box(abi: &ContractABI, input: &EncryptedInput) -> ChainResult<Vec<u8>> {
    encode_function_call(
        abi.function(OPEN_BOX)?,
        &[ABIValue::Bytes32(input.payload.0), ABIValue::Bytes(input.proof.clone())],
    )
}

/// Decode the `euint64` reward handle returned by `openBox`
pub fn decode_open_box_return(abi: &ContractABI, data: &[u8]) -> ChainResult<Handle> {
    let values = decode_return(abi.function(OPEN_BOX)?, data)?;
    Ok(Handle(values[0].as_bytes32()?))
}

/// Call data for `numberOfBoxes()`
pub fn encode_number_of_boxes(abi: &ContractABI) -> ChainResult<Vec<u8>> {
    encode_function_call(abi.function(NUMBER_OF_BOXES)?, &[])
}

/// Decode the `uint8` returned by `numberOfBoxes`
pub fn decode_number_of_boxes(abi: &ContractABI, data: &[u8]) -> ChainResult<u8> {
    let values = decode_return(abi.function(NUMBER_OF_BOXES)?, data)?;
    values[0].as_uint8()
}
