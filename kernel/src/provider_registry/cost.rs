mod private
{
  use crate::provider_registry::types::Usage;

  /// USD price per 1000 tokens, blended across prompt/completion, for models
  /// this kernel knows about. Unknown models fall back to `FALLBACK_PER_1K`.
  /// Kept as data, not branching code, per the registry's "providers are
  /// variants, costs are a lookup" design.
  const MODEL_PRICES_PER_1K : &[ ( &str, f64 ) ] =
  &[
    ( "deepseek-chat", 0.00014 ),
    ( "deepseek-reasoner", 0.00055 ),
    ( "gpt-4o", 0.005 ),
    ( "gpt-4o-mini", 0.00015 ),
    ( "gpt-3.5-turbo", 0.0005 ),
    ( "claude-3-haiku-20240307", 0.00025 ),
    ( "claude-3-5-sonnet-20241022", 0.003 ),
    ( "claude-3-opus-20240229", 0.015 ),
  ];

  const FALLBACK_PER_1K : f64 = 0.002;

  /// Looks up the blended per-1000-token USD price for `model`, via the
  /// longest registered prefix match so date-suffixed model ids (e.g. a newer
  /// `claude-3-5-sonnet-*` snapshot) still price sensibly.
  #[ must_use ]
  fn price_per_1k( model : &str ) -> f64
  {
    MODEL_PRICES_PER_1K.iter()
      .filter( | ( prefix, _ ) | model.starts_with( prefix ) )
      .max_by_key( | ( prefix, _ ) | prefix.len() )
      .map_or( FALLBACK_PER_1K, | ( _, price ) | *price )
  }

  /// Computes USD cost for `usage` against `model`'s price table, at
  /// 4-decimal display precision (spec §4.3).
  #[ must_use ]
  pub fn compute_cost( usage : Usage, model : &str ) -> f64
  {
    let raw = ( usage.total() as f64 / 1000.0 ) * price_per_1k( model );
    ( raw * 10_000.0 ).round() / 10_000.0
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn round_trip_chat_example_cost()
    {
      // spec §8 scenario 2 : deepseek-chat, usage defaulted to 1000 tokens.
      let cost = compute_cost( Usage::conservative_default(), "deepseek-chat" );
      assert!( ( cost - 0.00014 ).abs() < 1e-9 );
    }

    #[ test ]
    fn unknown_model_uses_fallback_price()
    {
      let cost = compute_cost( Usage { prompt_tokens : 500, completion_tokens : 500 }, "some-new-model" );
      assert!( ( cost - 0.002 ).abs() < 1e-9 );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    compute_cost,
  };
}
