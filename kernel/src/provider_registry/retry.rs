mod private
{
  use crate::error::{ KernelError, Result };
  use std::future::Future;
  use std::time::Duration;

  /// Explicit classification of one attempt's outcome (spec §9 redesign
  /// flag) : the retry loop branches on this, never on unwinding control.
  #[ derive( Debug ) ]
  pub enum AttemptOutcome< T >
  {
    /// The call succeeded.
    Ok( T ),
    /// The call failed in a way worth retrying.
    Retryable( KernelError ),
    /// The call failed in a way no retry will fix.
    Fatal( KernelError ),
  }

  fn classify( error : KernelError ) -> AttemptOutcome< core::convert::Infallible >
  {
    match error
    {
      KernelError::ProviderRateLimited { .. }
      | KernelError::ProviderUnavailable( _ )
      | KernelError::TransportTimeout( _ ) => AttemptOutcome::Retryable( error ),
      other => AttemptOutcome::Fatal( other ),
    }
  }

  fn retry_after_override( error : &KernelError ) -> Option< u64 >
  {
    match error
    {
      KernelError::ProviderRateLimited { retry_after_seconds : Some( s ) } => Some( s * 1_000 ),
      _ => None,
    }
  }

  fn backoff_delay_ms( attempt : u32, cap_ms : u64, jitter : f64 ) -> u64
  {
    let base = 100_u64.saturating_mul( 1_u64 << attempt.min( 16 ) ).min( cap_ms );
    let jitter_span = ( base as f64 * jitter ) as u64;
    if jitter_span == 0
    {
      return base;
    }
    let offset = rand::Rng::random_range( &mut rand::rng(), 0..=jitter_span );
    base.saturating_sub( jitter_span / 2 ).saturating_add( offset ).min( cap_ms )
  }

  /// Retries `call` per spec §4.3 : on status ≥ 500 / 429 / transport
  /// failures, exponential backoff with jitter capped at `cap_ms`, up to
  /// `max_attempts` total tries (1 initial + retries). A 429's `retry-after`
  /// overrides the computed delay. Any other failure is returned immediately.
  pub async fn retry_with_backoff< F, Fut, T >(
    max_attempts : u32,
    cap_ms : u64,
    jitter : f64,
    mut call : F,
  ) -> Result< T >
  where
    F : FnMut() -> Fut,
    Fut : Future< Output = Result< T > >,
  {
    let mut attempt = 0_u32;
    loop
    {
      attempt += 1;
      match call().await
      {
        Ok( value ) => return Ok( value ),
        Err( error ) =>
        {
          let outcome = classify( error );
          let error = match outcome
          {
            AttemptOutcome::Retryable( e ) => e,
            AttemptOutcome::Fatal( e ) => return Err( e ),
            AttemptOutcome::Ok( never ) => match never {},
          };

          if attempt >= max_attempts
          {
            return Err( error );
          }

          let delay_ms = retry_after_override( &error )
            .unwrap_or_else( || backoff_delay_ms( attempt, cap_ms, jitter ) );

          tracing::warn!( attempt, delay_ms, kind = error.kind(), "retrying provider call" );
          tokio::time::sleep( Duration::from_millis( delay_ms ) ).await;
        }
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use std::sync::atomic::{ AtomicU32, Ordering };

    #[ tokio::test ]
    async fn retries_until_success()
    {
      let attempts = AtomicU32::new( 0 );
      let result = retry_with_backoff( 3, 1, 0.0, ||
      {
        let n = attempts.fetch_add( 1, Ordering::SeqCst );
        async move
        {
          if n < 2
          {
            Err( KernelError::ProviderUnavailable( "boom".into() ) )
          }
          else
          {
            Ok( 42 )
          }
        }
      } ).await;

      assert_eq!( result.unwrap(), 42 );
      assert_eq!( attempts.load( Ordering::SeqCst ), 3 );
    }

    #[ tokio::test ]
    async fn gives_up_after_max_attempts()
    {
      let attempts = AtomicU32::new( 0 );
      let result : Result< () > = retry_with_backoff( 2, 1, 0.0, ||
      {
        attempts.fetch_add( 1, Ordering::SeqCst );
        async { Err( KernelError::ProviderUnavailable( "still down".into() ) ) }
      } ).await;

      assert!( result.is_err() );
      assert_eq!( attempts.load( Ordering::SeqCst ), 2 );
    }

    #[ tokio::test ]
    async fn fatal_errors_are_not_retried()
    {
      let attempts = AtomicU32::new( 0 );
      let result : Result< () > = retry_with_backoff( 5, 1, 0.0, ||
      {
        attempts.fetch_add( 1, Ordering::SeqCst );
        async { Err( KernelError::CredentialInvalid ) }
      } ).await;

      assert!( result.is_err() );
      assert_eq!( attempts.load( Ordering::SeqCst ), 1 );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    AttemptOutcome,
    retry_with_backoff,
  };
}
