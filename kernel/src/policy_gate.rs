mod private
{
  use crate::error::{ KernelError, Result };
  use std::collections::{ HashMap, VecDeque };
  use std::sync::{ Arc, Mutex };

  /// The allow-listed provider origins (spec §4.2, §6). A resolved provider
  /// URL whose origin isn't here is a fatal, non-recoverable error.
  pub const ALLOWED_ORIGINS : [ &str; 3 ] =
  [
    "https://api.deepseek.com",
    "https://api.openai.com",
    "https://api.anthropic.com",
  ];

  /// Abstracts "what time is it" so the 10 000 ms rate-limit boundary is
  /// unit-testable without real sleeps, mirroring how `api_xai::rate_limiting`
  /// keeps its refill clock behind `Instant` but substitutable here for tests.
  pub trait Clock : Send + Sync + core::fmt::Debug
  {
    /// Milliseconds since some fixed, monotonic epoch.
    fn now_ms( &self ) -> u64;
  }

  /// Real wall-clock `Clock`, monotonic from the moment it's constructed.
  #[ derive( Debug ) ]
  pub struct SystemClock( std::time::Instant );

  impl SystemClock
  {
    /// Starts a new monotonic epoch at the current instant.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self( std::time::Instant::now() )
    }
  }

  impl Default for SystemClock
  {
    fn default() -> Self { Self::new() }
  }

  impl Clock for SystemClock
  {
    fn now_ms( &self ) -> u64
    {
      u64::try_from( self.0.elapsed().as_millis() ).unwrap_or( u64::MAX )
    }
  }

  /// Per-client ring of admitted-request timestamps (spec §3 `RateLedger`).
  #[ derive( Debug, Default ) ]
  struct RateLedger
  {
    timestamps : VecDeque< u64 >,
  }

  /// Admission-control layer for chat/stream requests (spec §4.2). Policy
  /// decisions are pure functions of request + ledger; the gate never blocks,
  /// it only admits or refuses.
  #[ derive( Debug ) ]
  pub struct PolicyGate
  {
    ledgers : Mutex< HashMap< String, RateLedger > >,
    clock : Arc< dyn Clock >,
    window_ms : u64,
    max_age_ms : u64,
    max_message_chars : usize,
  }

  impl PolicyGate
  {
    /// Builds a gate with the real system clock.
    #[ must_use ]
    pub fn new( window_ms : u64, max_age_ms : u64, max_message_chars : usize ) -> Self
    {
      Self::with_clock( window_ms, max_age_ms, max_message_chars, Arc::new( SystemClock::new() ) )
    }

    /// Builds a gate over an injected `Clock`, for deterministic tests.
    #[ must_use ]
    pub fn with_clock(
      window_ms : u64,
      max_age_ms : u64,
      max_message_chars : usize,
      clock : Arc< dyn Clock >,
    ) -> Self
    {
      Self { ledgers : Mutex::new( HashMap::new() ), clock, window_ms, max_age_ms, max_message_chars }
    }

    /// Admits or rejects a request from `client_id`. On rejection the error
    /// carries the whole-second ceiling of the remaining wait.
    pub fn check_rate_limit( &self, client_id : &str ) -> Result< () >
    {
      let now = self.clock.now_ms();
      let mut ledgers = self.ledgers.lock().unwrap();
      let ledger = ledgers.entry( client_id.to_string() ).or_default();

      while let Some( &oldest ) = ledger.timestamps.front()
      {
        if now.saturating_sub( oldest ) > self.max_age_ms
        {
          ledger.timestamps.pop_front();
        }
        else
        {
          break;
        }
      }

      if let Some( &last ) = ledger.timestamps.back()
      {
        let elapsed = now.saturating_sub( last );
        if elapsed < self.window_ms
        {
          let remaining_ms = self.window_ms - elapsed;
          let seconds = remaining_ms.div_ceil( 1_000 );
          tracing::debug!( client_id, seconds, "rate limit rejected request" );
          return Err( KernelError::RateLimited { seconds } );
        }
      }

      ledger.timestamps.push_back( now );
      Ok( () )
    }

    /// Validates and sanitizes an inbound chat message (spec §4.2). Strips any
    /// `<…>` substrings (a conservative measure — the kernel never renders
    /// the message, only forwards it) and enforces the length ceiling.
    pub fn sanitize_message( &self, message : &str ) -> Result< String >
    {
      if message.is_empty()
      {
        return Err( KernelError::InvalidInput( "message must not be empty".into() ) );
      }

      let sanitized = strip_angle_bracket_runs( message );

      if sanitized.chars().count() > self.max_message_chars
      {
        return Err( KernelError::InvalidInput(
          format!( "message exceeds {} characters", self.max_message_chars )
        ) );
      }

      Ok( sanitized )
    }

    /// Validates a resolved provider origin against the allow-list. A
    /// mismatch is fatal, not recoverable.
    pub fn validate_endpoint_origin( &self, origin : &str ) -> Result< () >
    {
      if ALLOWED_ORIGINS.contains( &origin )
      {
        Ok( () )
      }
      else
      {
        Err( KernelError::EndpointNotAllowed( origin.to_string() ) )
      }
    }

    /// Validates that a completed provider response declared a JSON content
    /// type.
    pub fn validate_response_content_type( &self, content_type : Option< &str > ) -> Result< () >
    {
      match content_type
      {
        Some( ct ) if ct.contains( "application/json" ) => Ok( () ),
        other => Err( KernelError::ResponseMalformed(
          format!( "expected application/json, got {other:?}" )
        ) ),
      }
    }
  }

  /// Strips every `<…>` run from `input`. Not an HTML parser — deliberately
  /// conservative, since the kernel never renders the message. An unmatched
  /// `<` with no later `>` is left in place along with the rest of the text,
  /// matching a `/<[^>]*>/g`-style regex rather than discarding the tail.
  fn strip_angle_bracket_runs( input : &str ) -> String
  {
    let mut out = String::with_capacity( input.len() );
    let chars : Vec< char > = input.chars().collect();
    let mut i = 0;
    while i < chars.len()
    {
      if chars[ i ] == '<'
      {
        if let Some( close ) = chars[ i.. ].iter().position( | &c | c == '>' )
        {
          i += close + 1;
          continue;
        }
      }
      out.push( chars[ i ] );
      i += 1;
    }
    out
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ derive( Debug ) ]
    struct TestClock( Mutex< u64 > );

    impl TestClock
    {
      fn new() -> Arc< Self > { Arc::new( Self( Mutex::new( 0 ) ) ) }
      fn advance( &self, ms : u64 ) { *self.0.lock().unwrap() += ms; }
    }

    impl Clock for TestClock
    {
      fn now_ms( &self ) -> u64 { *self.0.lock().unwrap() }
    }

    #[ test ]
    fn second_request_within_window_is_rate_limited()
    {
      let clock = TestClock::new();
      let gate = PolicyGate::with_clock( 10_000, 3_600_000, 1_000, clock.clone() );
      gate.check_rate_limit( "c1" ).unwrap();
      clock.advance( 500 );
      let err = gate.check_rate_limit( "c1" ).unwrap_err();
      match err
      {
        KernelError::RateLimited { seconds } => assert!( ( 9..=10 ).contains( &seconds ) ),
        other => panic!( "unexpected error : {other:?}" ),
      }
    }

    #[ test ]
    fn request_at_exactly_the_window_boundary_is_admitted()
    {
      let clock = TestClock::new();
      let gate = PolicyGate::with_clock( 10_000, 3_600_000, 1_000, clock.clone() );
      gate.check_rate_limit( "c1" ).unwrap();
      clock.advance( 10_000 );
      gate.check_rate_limit( "c1" ).unwrap();
    }

    #[ test ]
    fn different_clients_do_not_interfere()
    {
      let clock = TestClock::new();
      let gate = PolicyGate::with_clock( 10_000, 3_600_000, 1_000, clock.clone() );
      gate.check_rate_limit( "c1" ).unwrap();
      gate.check_rate_limit( "c2" ).unwrap();
    }

    #[ test ]
    fn message_length_boundary()
    {
      let gate = PolicyGate::new( 10_000, 3_600_000, 1_000 );
      let exactly_1000 = "a".repeat( 1_000 );
      assert!( gate.sanitize_message( &exactly_1000 ).is_ok() );
      let over = "a".repeat( 1_001 );
      assert!( gate.sanitize_message( &over ).is_err() );
    }

    #[ test ]
    fn angle_bracket_runs_are_stripped()
    {
      let gate = PolicyGate::new( 10_000, 3_600_000, 1_000 );
      let sanitized = gate.sanitize_message( "hi <script>alert(1)</script> there" ).unwrap();
      assert_eq!( sanitized, "hi alert(1) there" );
    }

    #[ test ]
    fn unmatched_angle_bracket_does_not_swallow_the_rest_of_the_message()
    {
      let gate = PolicyGate::new( 10_000, 3_600_000, 1_000 );
      let sanitized = gate.sanitize_message( "compare 3 < 5 please" ).unwrap();
      assert_eq!( sanitized, "compare 3 < 5 please" );
    }

    #[ test ]
    fn empty_message_is_rejected()
    {
      let gate = PolicyGate::new( 10_000, 3_600_000, 1_000 );
      assert!( gate.sanitize_message( "" ).is_err() );
    }

    #[ test ]
    fn endpoint_allow_list()
    {
      let gate = PolicyGate::new( 10_000, 3_600_000, 1_000 );
      assert!( gate.validate_endpoint_origin( "https://api.openai.com" ).is_ok() );
      assert!( gate.validate_endpoint_origin( "evil.example.com" ).is_err() );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    Clock,
    SystemClock,
    PolicyGate,
    ALLOWED_ORIGINS,
  };
}
