//! Uniform access to DeepSeek, OpenAI, and Anthropic behind one `Provider`
//! trait, plus retry/backoff and per-model cost accounting (spec §4.3).

mod private {}

crate::mod_interface!
{
  layer types;
  layer cost;
  layer retry;
  layer deepseek;
  layer openai;
  layer anthropic;
  layer registry;
}
