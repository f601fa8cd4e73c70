//! Construction of calldata for contract methods.
//!
//! Argument values arrive as human-readable strings (CLI arguments, config
//! entries) and are tokenized against the parameter types the ABI declares
//! before encoding. Encoding is pure: no chain access, deterministic output.

use ethers::{
    abi::{
        token::{LenientTokenizer, Tokenizer},
        Abi, Function, Param, Token,
    },
    types::Bytes,
};

use crate::errors::ScriptError;

/// Tokenize argument strings against the declared parameters.
///
/// Fails when the argument count or any argument's shape does not match
/// the declared types.
pub fn tokenize_inputs(params: &[Param], args: &[String]) -> Result<Vec<Token>, ScriptError> {
    if params.len() != args.len() {
        return Err(ScriptError::CalldataConstruction(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            LenientTokenizer::tokenize(&param.kind, arg).map_err(|e| {
                ScriptError::CalldataConstruction(format!(
                    "argument `{arg}` does not match type {}: {e}",
                    param.kind
                ))
            })
        })
        .collect()
}

/// Encode a call to `function_name` with the given argument strings
pub fn encode_call(abi: &Abi, function_name: &str, args: &[String]) -> Result<Bytes, ScriptError> {
    let function = lookup_function(abi, function_name)?;
    let tokens = tokenize_inputs(&function.inputs, args)?;

    function
        .encode_input(&tokens)
        .map(Bytes::from)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// Look up `function_name` in the ABI
fn lookup_function<'a>(abi: &'a Abi, function_name: &str) -> Result<&'a Function, ScriptError> {
    abi.function(function_name)
        .map_err(|e| ScriptError::CalldataConstruction(format!("{function_name}: {e}")))
}

#[cfg(test)]
mod tests {
    use ethers::abi::Abi;

    use crate::errors::ScriptError;

    use super::encode_call;

    const TOKEN_ABI: &str = r#"[
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                { "name": "to", "type": "address" },
                { "name": "value", "type": "uint256" }
            ],
            "outputs": [{ "name": "", "type": "bool" }],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "initialize",
            "inputs": [
                { "name": "cap", "type": "uint256" },
                { "name": "treasury", "type": "address" }
            ],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ]"#;

    const TREASURY: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn token_abi() -> Abi {
        serde_json::from_str(TOKEN_ABI).unwrap()
    }

    #[test]
    fn test_known_selector() {
        let calldata = encode_call(
            &token_abi(),
            "transfer",
            &[TREASURY.to_string(), "100".to_string()],
        )
        .unwrap();

        // keccak256("transfer(address,uint256)")[..4]
        assert_eq!(hex::encode(&calldata[..4]), "a9059cbb");
        // Selector plus two 32-byte words
        assert_eq!(calldata.len(), 4 + 2 * 32);
    }

    #[test]
    fn test_deterministic() {
        let args = ["1000".to_string(), TREASURY.to_string()];
        let first = encode_call(&token_abi(), "initialize", &args).unwrap();
        let second = encode_call(&token_abi(), "initialize", &args).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_arity_mismatch() {
        let result = encode_call(&token_abi(), "initialize", &["1000".to_string()]);
        assert!(matches!(result, Err(ScriptError::CalldataConstruction(_))));
    }

    #[test]
    fn test_unknown_function() {
        let result = encode_call(&token_abi(), "mint", &[]);
        assert!(matches!(result, Err(ScriptError::CalldataConstruction(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let result = encode_call(
            &token_abi(),
            "initialize",
            &["not-a-number".to_string(), TREASURY.to_string()],
        );
        assert!(matches!(result, Err(ScriptError::CalldataConstruction(_))));
    }
}
